//! Core types shared by the store, engine and turn lifecycle

use catalog_core::{ConditionDefinition, ConditionId};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Identity
// ============================================================================

/// Identifier of an actor owning condition instances
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub String);

impl From<&str> for ActorId {
    fn from(s: &str) -> Self {
        ActorId(s.to_string())
    }
}

impl From<String> for ActorId {
    fn from(s: String) -> Self {
        ActorId(s)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Instances
// ============================================================================

/// A condition currently active on one actor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionInstance {
    pub condition_id: ConditionId,
    /// Rounds left before expiry; `None` lasts until removed
    pub duration_rounds: Option<u32>,
    /// Parent condition when auto-applied by a cascade
    pub implied_by: Option<ConditionId>,
    /// Who or what caused the condition (attribution only)
    pub source_ref: Option<String>,
}

impl ConditionInstance {
    /// An independently applied, indefinite instance
    pub fn new(condition_id: impl Into<ConditionId>) -> Self {
        ConditionInstance {
            condition_id: condition_id.into(),
            duration_rounds: None,
            implied_by: None,
            source_ref: None,
        }
    }

    pub fn with_duration(mut self, rounds: Option<u32>) -> Self {
        self.duration_rounds = rounds;
        self
    }

    pub fn with_source(mut self, source_ref: Option<String>) -> Self {
        self.source_ref = source_ref;
        self
    }

    pub fn implied(mut self, parent: ConditionId) -> Self {
        self.implied_by = Some(parent);
        self
    }

    /// Whether this instance only exists because of a cascade
    pub fn is_implied(&self) -> bool {
        self.implied_by.is_some()
    }

    pub fn is_indefinite(&self) -> bool {
        self.duration_rounds.is_none()
    }
}

/// Options for applying a condition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    pub duration_rounds: Option<u32>,
    pub source_ref: Option<String>,
}

impl ApplyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_rounds(rounds: u32) -> Self {
        ApplyOptions {
            duration_rounds: Some(rounds),
            source_ref: None,
        }
    }

    pub fn with_source(mut self, source_ref: impl Into<String>) -> Self {
        self.source_ref = Some(source_ref.into());
        self
    }
}

/// An active instance resolved against its catalog definition
#[derive(Debug, Clone, Copy)]
pub struct ActiveCondition<'a> {
    pub instance: &'a ConditionInstance,
    pub definition: &'a ConditionDefinition,
}

impl ActiveCondition<'_> {
    pub fn id(&self) -> &ConditionId {
        &self.instance.condition_id
    }
}

// ============================================================================
// Rolls
// ============================================================================

/// Category of a dice roll, selecting which modifiers apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollType {
    Attack,
    Defense,
    Physical,
    Skill,
    Social,
    Knowledge,
}

impl RollType {
    pub fn all() -> &'static [RollType] {
        &[
            RollType::Attack,
            RollType::Defense,
            RollType::Physical,
            RollType::Skill,
            RollType::Social,
            RollType::Knowledge,
        ]
    }
}

impl fmt::Display for RollType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RollType::Attack => "attack",
            RollType::Defense => "defense",
            RollType::Physical => "physical",
            RollType::Skill => "skill",
            RollType::Social => "social",
            RollType::Knowledge => "knowledge",
        };
        f.write_str(s)
    }
}

/// Attack range context for a roll
///
/// When neither flag is set, range-dependent modifiers contribute nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollContext {
    pub is_melee: bool,
    pub is_ranged: bool,
}

impl RollContext {
    pub fn melee() -> Self {
        RollContext {
            is_melee: true,
            is_ranged: false,
        }
    }

    pub fn ranged() -> Self {
        RollContext {
            is_melee: false,
            is_ranged: true,
        }
    }
}

/// One condition's contribution to a roll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifierEntry {
    pub condition_id: ConditionId,
    pub modifier: i32,
    pub reason: String,
}

/// Summed modifiers for a roll with per-condition breakdown
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifierTotal {
    pub total: i32,
    pub breakdown: Vec<ModifierEntry>,
}

impl ModifierTotal {
    /// Record a contribution; zero values are skipped
    pub fn push(&mut self, condition_id: &ConditionId, modifier: i32, reason: impl Into<String>) {
        if modifier == 0 {
            return;
        }
        self.total += modifier;
        self.breakdown.push(ModifierEntry {
            condition_id: condition_id.clone(),
            modifier,
            reason: reason.into(),
        });
    }
}

/// Short-circuit flags for attacks against a target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TargetFlags {
    pub is_defenseless: bool,
    pub attacks_are_trivial: bool,
}

/// A target's defensive state as seen by an attacker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetModifiers {
    pub defense_modifier: i32,
    pub attacker_bonus: i32,
    pub breakdown: Vec<ModifierEntry>,
    pub flags: TargetFlags,
}

/// Every behavioural flag of an actor's active conditions, combined
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveFlags {
    pub end_of_turn_damage: u32,
    pub lose_actions: u32,
    pub cannot_move: bool,
    pub is_defenseless: bool,
    pub auto_prone: bool,
    pub attackers_gain_bonus: i32,
    pub attacks_are_trivial: bool,
    /// Active conditions removed once the bearer attacks
    pub lost_on_attack: Vec<ConditionId>,
}

impl ActiveFlags {
    /// Whether the actor keeps at least one action given `actions_per_turn`
    pub fn can_act(&self, actions_per_turn: u32) -> bool {
        self.lose_actions < actions_per_turn
    }
}

/// Externally reported health state consulted at end of turn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VitalSigns {
    pub at_breaking_point: bool,
    pub stabilized: bool,
}

impl VitalSigns {
    pub fn healthy() -> Self {
        Self::default()
    }

    pub fn broken() -> Self {
        VitalSigns {
            at_breaking_point: true,
            stabilized: false,
        }
    }

    /// Breaking point reached and not yet stabilized
    pub fn needs_resilience_roll(&self) -> bool {
        self.at_breaking_point && !self.stabilized
    }
}
