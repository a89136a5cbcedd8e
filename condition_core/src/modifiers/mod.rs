//! Modifier aggregation - Condition contributions to dice rolls
//!
//! Rules per roll type:
//! - attack: `attack` + `attack_from_hiding` + `all_rolls`
//! - defense: `defense`, or `defense_melee`/`defense_ranged` for conditions
//!   with a context-sensitive defense (prone). With no range in the context
//!   those contribute 0. `all_rolls` never applies to defense.
//! - physical/skill/social/knowledge: the matching key + `all_rolls`
//!
//! The engine only computes modifiers; rolling is the caller's job.

use crate::engine::ConditionEngine;
use crate::persistence::ConditionPersistence;
use crate::store::ConditionStore;
use crate::types::{
    ActiveCondition, ActiveFlags, ModifierEntry, ModifierTotal, RollContext, RollType,
    TargetFlags, TargetModifiers,
};
use catalog_core::ConditionDefinition;

/// Sum the modifiers of active conditions for a roll
pub fn aggregate_modifiers(
    active: &[ActiveCondition<'_>],
    roll_type: RollType,
    context: RollContext,
) -> ModifierTotal {
    let mut total = ModifierTotal::default();

    for condition in active {
        let def = condition.definition;
        let mods = &def.modifiers;
        let id = &def.id;

        match roll_type {
            RollType::Attack => {
                total.push(id, mods.attack, "attack");
                total.push(id, mods.attack_from_hiding, "attack from hiding");
            }
            RollType::Defense => {
                if let Some((value, reason)) = defense_contribution(def, context) {
                    total.push(id, value, reason);
                }
            }
            RollType::Physical => total.push(id, mods.physical, "physical"),
            RollType::Skill => total.push(id, mods.skill, "skill"),
            RollType::Social => total.push(id, mods.social, "social"),
            RollType::Knowledge => total.push(id, mods.knowledge, "knowledge"),
        }

        if roll_type != RollType::Defense {
            total.push(id, mods.all_rolls, "all rolls");
        }
    }

    total
}

/// A condition's contribution to a defense roll in the given context
///
/// Melee takes precedence when both range flags are set.
pub fn defense_contribution(
    def: &ConditionDefinition,
    context: RollContext,
) -> Option<(i32, &'static str)> {
    let mods = &def.modifiers;
    if !mods.has_contextual_defense() {
        return Some((mods.defense, "defense"));
    }

    if context.is_melee {
        mods.defense_melee.map(|v| (v, "defense vs melee"))
    } else if context.is_ranged {
        mods.defense_ranged.map(|v| (v, "defense vs ranged"))
    } else {
        None
    }
}

/// Combine the flags of active conditions
pub fn aggregate_flags(active: &[ActiveCondition<'_>]) -> ActiveFlags {
    let mut flags = ActiveFlags::default();

    for condition in active {
        let f = &condition.definition.flags;
        flags.end_of_turn_damage += f.end_of_turn_damage;
        flags.lose_actions += f.lose_actions;
        flags.cannot_move |= f.cannot_move;
        flags.is_defenseless |= f.is_defenseless;
        flags.auto_prone |= f.auto_prone;
        flags.attackers_gain_bonus += f.attackers_gain_bonus;
        flags.attacks_are_trivial |= f.attacks_are_trivial;
        if f.lost_on_attack {
            flags.lost_on_attack.push(condition.id().clone());
        }
    }

    flags
}

impl<P: ConditionPersistence> ConditionEngine<P> {
    /// Modifiers an actor's own conditions apply to one of its rolls
    pub fn get_modifiers(
        &self,
        store: &ConditionStore,
        roll_type: RollType,
        context: RollContext,
    ) -> ModifierTotal {
        aggregate_modifiers(&self.get_active(store), roll_type, context)
    }

    /// A target's defensive state, read by someone attacking it
    pub fn get_target_modifiers(
        &self,
        target: &ConditionStore,
        context: RollContext,
    ) -> TargetModifiers {
        let active = self.get_active(target);
        let defense = aggregate_modifiers(&active, RollType::Defense, context);
        let flags = aggregate_flags(&active);

        let mut breakdown = defense.breakdown;
        for condition in &active {
            let bonus = condition.definition.flags.attackers_gain_bonus;
            if bonus != 0 {
                breakdown.push(ModifierEntry {
                    condition_id: condition.id().clone(),
                    modifier: bonus,
                    reason: "attacker bonus".to_string(),
                });
            }
        }

        TargetModifiers {
            defense_modifier: defense.total,
            attacker_bonus: flags.attackers_gain_bonus,
            breakdown,
            flags: TargetFlags {
                is_defenseless: flags.is_defenseless,
                attacks_are_trivial: flags.attacks_are_trivial,
            },
        }
    }

    /// All behavioural flags of an actor's active conditions
    pub fn active_flags(&self, store: &ConditionStore) -> ActiveFlags {
        aggregate_flags(&self.get_active(store))
    }
}
