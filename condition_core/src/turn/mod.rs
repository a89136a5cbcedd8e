//! Turn lifecycle - Start/end of turn processing and round decay
//!
//! Driven entirely by the external combat driver. Per combatant and round
//! the phase goes `Idle -> TurnStart -> TurnEnd`, and back to `Idle` when
//! the round advances. Out-of-order signals are logged and processed anyway.
//!
//! The coordinator reports damage and lost actions; applying them to the
//! actor is left to the caller, as is deciding on a resilience roll.

mod events;

pub use events::{EventBus, LifecycleEvent, ListenerId};

use crate::engine::ConditionEngine;
use crate::error::{CascadeStepFailed, DecayStepFailed};
use crate::persistence::ConditionPersistence;
use crate::store::ConditionStore;
use crate::types::{ActorId, VitalSigns};
use catalog_core::ConditionId;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Where a combatant is in its turn for the current round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TurnPhase {
    #[default]
    Idle,
    TurnStart,
    TurnEnd,
}

/// Result of start-of-turn processing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnStartReport {
    pub actions_lost: u32,
    pub messages: Vec<String>,
}

/// Result of end-of-turn processing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnEndReport {
    /// Trauma the caller should apply to the actor
    pub trauma_taken: u32,
    /// The actor is at breaking point and not stabilized
    pub resilience_roll_needed: bool,
    pub messages: Vec<String>,
}

/// A condition removed from an actor during round advance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredCondition {
    pub actor_id: ActorId,
    pub condition_id: ConditionId,
}

/// Result of advancing the round for every combatant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundAdvanceReport {
    /// The round that just started
    pub round: u32,
    /// Conditions whose duration ran out
    pub expired: Vec<ExpiredCondition>,
    /// Implied conditions removed with an expired parent
    pub removed_by_cascade: Vec<ExpiredCondition>,
    pub cascade_failures: Vec<CascadeStepFailed>,
    /// Instances that kept their duration because a write was rejected
    pub decay_failures: Vec<DecayStepFailed>,
}

/// Reacts to round and turn signals from the combat driver
#[derive(Debug, Default)]
pub struct TurnLifecycleCoordinator {
    round: u32,
    phases: HashMap<ActorId, TurnPhase>,
    events: EventBus,
}

impl TurnLifecycleCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rounds advanced so far
    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn phase(&self, actor_id: &ActorId) -> TurnPhase {
        self.phases.get(actor_id).copied().unwrap_or_default()
    }

    /// Register an observer for lifecycle events
    pub fn subscribe(&mut self, listener: impl FnMut(&LifecycleEvent) + 'static) -> ListenerId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Start-of-turn processing: total the actions lost to conditions
    pub fn on_turn_start<P: ConditionPersistence>(
        &mut self,
        engine: &ConditionEngine<P>,
        store: &ConditionStore,
    ) -> TurnStartReport {
        self.transition(store.actor_id(), TurnPhase::Idle, TurnPhase::TurnStart);

        let mut report = TurnStartReport::default();
        for active in engine.get_active(store) {
            let lost = active.definition.flags.lose_actions;
            if lost > 0 {
                report.actions_lost += lost;
                report.messages.push(format!(
                    "{} loses {} action(s) to {}",
                    store.actor_id(),
                    lost,
                    active.definition.label
                ));
            }
        }

        debug!(
            actor = %store.actor_id(),
            actions_lost = report.actions_lost,
            "turn started"
        );
        self.events.emit(&LifecycleEvent::TurnStarted {
            actor_id: store.actor_id().clone(),
            actions_lost: report.actions_lost,
        });
        report
    }

    /// End-of-turn processing: total periodic damage and check breaking point
    ///
    /// `vitals` is the actor's externally computed health state.
    pub fn on_turn_end<P: ConditionPersistence>(
        &mut self,
        engine: &ConditionEngine<P>,
        store: &ConditionStore,
        vitals: VitalSigns,
    ) -> TurnEndReport {
        self.transition(store.actor_id(), TurnPhase::TurnStart, TurnPhase::TurnEnd);

        let mut report = TurnEndReport::default();
        for active in engine.get_active(store) {
            let damage = active.definition.flags.end_of_turn_damage;
            if damage > 0 {
                report.trauma_taken += damage;
                report.messages.push(format!(
                    "{} takes {} trauma from {}",
                    store.actor_id(),
                    damage,
                    active.definition.label
                ));
            }
        }

        if vitals.needs_resilience_roll() {
            report.resilience_roll_needed = true;
            report.messages.push(format!(
                "{} is at breaking point and must make a resilience roll",
                store.actor_id()
            ));
        }

        debug!(
            actor = %store.actor_id(),
            trauma = report.trauma_taken,
            resilience_roll_needed = report.resilience_roll_needed,
            "turn ended"
        );
        self.events.emit(&LifecycleEvent::TurnEnded {
            actor_id: store.actor_id().clone(),
            trauma_taken: report.trauma_taken,
            resilience_roll_needed: report.resilience_roll_needed,
        });
        report
    }

    /// Advance the round: decay every finite duration by one
    ///
    /// Combatants are processed one at a time, in the order given. Rejected
    /// persistence writes are collected in `decay_failures` and every other
    /// combatant is still processed, so no instance decays twice in a round.
    pub fn on_round_advance<'a, P, I>(
        &mut self,
        engine: &mut ConditionEngine<P>,
        combatants: I,
    ) -> RoundAdvanceReport
    where
        P: ConditionPersistence,
        I: IntoIterator<Item = &'a mut ConditionStore>,
    {
        self.round += 1;
        let mut report = RoundAdvanceReport {
            round: self.round,
            ..Default::default()
        };

        for store in combatants {
            let decay = engine.decay(store);
            let actor_id = store.actor_id().clone();

            for condition_id in decay.expired {
                self.events.emit(&LifecycleEvent::ConditionExpired {
                    actor_id: actor_id.clone(),
                    condition_id: condition_id.clone(),
                });
                report.expired.push(ExpiredCondition {
                    actor_id: actor_id.clone(),
                    condition_id,
                });
            }
            report
                .removed_by_cascade
                .extend(decay.removed_by_cascade.into_iter().map(|condition_id| {
                    ExpiredCondition {
                        actor_id: actor_id.clone(),
                        condition_id,
                    }
                }));
            report.cascade_failures.extend(decay.cascade_failures);
            report.decay_failures.extend(decay.decay_failures);
        }

        self.phases.clear();

        info!(
            round = self.round,
            expired = report.expired.len(),
            cascaded = report.removed_by_cascade.len(),
            failed = report.decay_failures.len(),
            "round advanced"
        );
        self.events.emit(&LifecycleEvent::RoundAdvanced {
            round: self.round,
            expired: report.expired.len(),
        });
        report
    }

    fn transition(&mut self, actor_id: &ActorId, expected: TurnPhase, next: TurnPhase) {
        let current = self.phase(actor_id);
        if current != expected {
            warn!(
                actor = %actor_id,
                ?current,
                ?expected,
                "turn signal out of order"
            );
        }
        self.phases.insert(actor_id.clone(), next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryPersistence;
    use crate::types::{ApplyOptions, RollContext, RollType};
    use catalog_core::ConditionCatalog;
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;

    fn engine() -> ConditionEngine<MemoryPersistence> {
        let catalog = ConditionCatalog::builtin().unwrap();
        ConditionEngine::with_persistence(Arc::new(catalog), MemoryPersistence::new())
    }

    #[test]
    fn test_poisoned_end_to_end() {
        let mut engine = engine();
        let mut coordinator = TurnLifecycleCoordinator::new();
        let mut store = ConditionStore::new("hero");
        engine.apply(&mut store, "poisoned", ApplyOptions::new()).unwrap();

        let attack = engine.get_modifiers(&store, RollType::Attack, RollContext::default());
        assert_eq!(attack.total, -2);

        let end = coordinator.on_turn_end(&engine, &store, VitalSigns::healthy());
        assert_eq!(end.trauma_taken, 1);
        assert!(!end.resilience_roll_needed);
        assert_eq!(end.messages, vec!["hero takes 1 trauma from Poisoned".to_string()]);
    }

    #[test]
    fn test_turn_start_sums_lost_actions() {
        let mut engine = engine();
        let mut coordinator = TurnLifecycleCoordinator::new();
        let mut store = ConditionStore::new("hero");
        engine.apply(&mut store, "stunned", ApplyOptions::new()).unwrap();
        engine
            .apply(&mut store, "unconscious", ApplyOptions::new())
            .unwrap();

        let start = coordinator.on_turn_start(&engine, &store);
        assert_eq!(start.actions_lost, 3);
        assert_eq!(start.messages.len(), 2);
        assert_eq!(coordinator.phase(store.actor_id()), TurnPhase::TurnStart);
    }

    #[test]
    fn test_resilience_roll_only_when_not_stabilized() {
        let engine = engine();
        let mut coordinator = TurnLifecycleCoordinator::new();
        let store = ConditionStore::new("hero");

        let end = coordinator.on_turn_end(&engine, &store, VitalSigns::broken());
        assert!(end.resilience_roll_needed);
        assert_eq!(end.trauma_taken, 0);

        let stabilized = VitalSigns {
            at_breaking_point: true,
            stabilized: true,
        };
        let end = coordinator.on_turn_end(&engine, &store, stabilized);
        assert!(!end.resilience_roll_needed);
    }

    #[test]
    fn test_duration_expires_after_exact_rounds() {
        let mut engine = engine();
        let mut coordinator = TurnLifecycleCoordinator::new();
        let mut store = ConditionStore::new("hero");
        engine
            .apply(&mut store, "dazed", ApplyOptions::for_rounds(1))
            .unwrap();
        assert!(store.has("dazed"));

        let report = coordinator.on_round_advance(&mut engine, [&mut store]);
        assert!(!store.has("dazed"));
        assert_eq!(report.round, 1);
        assert_eq!(
            report.expired,
            vec![ExpiredCondition {
                actor_id: ActorId::from("hero"),
                condition_id: ConditionId::from("dazed"),
            }]
        );
    }

    #[test]
    fn test_decrement_is_persisted() {
        let mut engine = engine();
        let mut coordinator = TurnLifecycleCoordinator::new();
        let mut store = ConditionStore::new("hero");
        engine
            .apply(&mut store, "bleeding", ApplyOptions::for_rounds(3))
            .unwrap();

        coordinator.on_round_advance(&mut engine, [&mut store]);
        assert_eq!(store.get("bleeding").unwrap().duration_rounds, Some(2));
        let persisted = engine.persistence().instances(&ActorId::from("hero"));
        assert_eq!(persisted[0].duration_rounds, Some(2));
    }

    #[test]
    fn test_expiring_parent_cascades() {
        let mut engine = engine();
        let mut coordinator = TurnLifecycleCoordinator::new();
        let mut knight = ConditionStore::new("knight");
        let mut archer = ConditionStore::new("archer");
        engine
            .apply(&mut knight, "unconscious", ApplyOptions::for_rounds(1))
            .unwrap();
        engine.apply(&mut archer, "hidden", ApplyOptions::new()).unwrap();

        let mut combatants = vec![knight, archer];
        let report = coordinator
            .on_round_advance(&mut engine, combatants.iter_mut());

        assert!(combatants[0].is_empty());
        assert!(combatants[1].has("hidden"));
        assert_eq!(report.expired.len(), 1);
        let cascaded: Vec<&str> = report
            .removed_by_cascade
            .iter()
            .map(|e| e.condition_id.as_str())
            .collect();
        assert_eq!(cascaded, vec!["defenseless", "prone"]);
    }

    #[test]
    fn test_round_advance_resets_phases() {
        let mut engine = engine();
        let mut coordinator = TurnLifecycleCoordinator::new();
        let mut store = ConditionStore::new("hero");

        coordinator.on_turn_start(&engine, &store);
        coordinator.on_turn_end(&engine, &store, VitalSigns::healthy());
        assert_eq!(coordinator.phase(store.actor_id()), TurnPhase::TurnEnd);

        coordinator.on_round_advance(&mut engine, [&mut store]);
        assert_eq!(coordinator.phase(store.actor_id()), TurnPhase::Idle);
        assert_eq!(coordinator.round(), 1);
    }

    #[test]
    fn test_events_are_published() {
        let mut engine = engine();
        let mut coordinator = TurnLifecycleCoordinator::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        coordinator.subscribe(move |event| sink.borrow_mut().push(event.clone()));

        let mut store = ConditionStore::new("hero");
        engine
            .apply(&mut store, "stunned", ApplyOptions::for_rounds(1))
            .unwrap();

        coordinator.on_turn_start(&engine, &store);
        coordinator.on_turn_end(&engine, &store, VitalSigns::healthy());
        coordinator.on_round_advance(&mut engine, [&mut store]);

        let events = seen.borrow();
        assert_eq!(
            *events,
            vec![
                LifecycleEvent::TurnStarted {
                    actor_id: ActorId::from("hero"),
                    actions_lost: 1,
                },
                LifecycleEvent::TurnEnded {
                    actor_id: ActorId::from("hero"),
                    trauma_taken: 0,
                    resilience_roll_needed: false,
                },
                LifecycleEvent::ConditionExpired {
                    actor_id: ActorId::from("hero"),
                    condition_id: ConditionId::from("stunned"),
                },
                LifecycleEvent::RoundAdvanced {
                    round: 1,
                    expired: 1,
                },
            ]
        );
    }

    #[test]
    fn test_rejected_write_does_not_stop_the_round() {
        let mut engine = engine();
        let mut coordinator = TurnLifecycleCoordinator::new();
        let mut scout = ConditionStore::new("scout");
        let mut brute = ConditionStore::new("brute");
        let mut mage = ConditionStore::new("mage");
        engine
            .apply(&mut scout, "dazed", ApplyOptions::for_rounds(3))
            .unwrap();
        engine
            .apply(&mut brute, "bleeding", ApplyOptions::for_rounds(3))
            .unwrap();
        engine
            .apply(&mut mage, "frightened", ApplyOptions::for_rounds(3))
            .unwrap();
        coordinator.on_turn_start(&engine, &scout);

        engine.persistence_mut().fail_condition("bleeding");
        let report =
            coordinator.on_round_advance(&mut engine, [&mut scout, &mut brute, &mut mage]);

        assert_eq!(report.round, 1);
        assert_eq!(report.decay_failures.len(), 1);
        assert_eq!(report.decay_failures[0].actor_id, ActorId::from("brute"));
        assert_eq!(report.decay_failures[0].condition.as_str(), "bleeding");
        assert_eq!(scout.get("dazed").unwrap().duration_rounds, Some(2));
        assert_eq!(brute.get("bleeding").unwrap().duration_rounds, Some(3));
        assert_eq!(mage.get("frightened").unwrap().duration_rounds, Some(2));
        assert_eq!(coordinator.phase(scout.actor_id()), TurnPhase::Idle);

        // The next round decrements each instance exactly once more
        let report =
            coordinator.on_round_advance(&mut engine, [&mut scout, &mut brute, &mut mage]);
        assert_eq!(report.decay_failures.len(), 1);
        assert_eq!(scout.get("dazed").unwrap().duration_rounds, Some(1));
        assert_eq!(mage.get("frightened").unwrap().duration_rounds, Some(1));
        let persisted = engine.persistence().instances(&ActorId::from("scout"));
        assert_eq!(persisted[0].duration_rounds, Some(1));
    }

    #[test]
    fn test_rejected_expiry_keeps_instance_for_next_round() {
        let mut engine = engine();
        let mut coordinator = TurnLifecycleCoordinator::new();
        let mut store = ConditionStore::new("hero");
        engine
            .apply(&mut store, "unconscious", ApplyOptions::for_rounds(1))
            .unwrap();

        engine.persistence_mut().set_failing(true);
        let report = coordinator.on_round_advance(&mut engine, [&mut store]);
        assert!(report.expired.is_empty());
        assert_eq!(report.decay_failures.len(), 1);
        assert_eq!(store.len(), 3);

        engine.persistence_mut().set_failing(false);
        let report = coordinator.on_round_advance(&mut engine, [&mut store]);
        assert_eq!(report.expired.len(), 1);
        assert_eq!(report.removed_by_cascade.len(), 2);
        assert!(store.is_empty());
    }

    proptest! {
        #[test]
        fn prop_finite_duration_expires_exactly(rounds in 1u32..12) {
            let mut engine = engine();
            let mut coordinator = TurnLifecycleCoordinator::new();
            let mut store = ConditionStore::new("hero");
            engine
                .apply(&mut store, "bleeding", ApplyOptions::for_rounds(rounds))
                .unwrap();

            for _ in 0..rounds - 1 {
                coordinator.on_round_advance(&mut engine, [&mut store]);
                prop_assert!(store.has("bleeding"));
            }
            coordinator.on_round_advance(&mut engine, [&mut store]);
            prop_assert!(!store.has("bleeding"));
        }

        #[test]
        fn prop_indefinite_duration_survives(advances in 0usize..30) {
            let mut engine = engine();
            let mut coordinator = TurnLifecycleCoordinator::new();
            let mut store = ConditionStore::new("hero");
            engine.apply(&mut store, "prone", ApplyOptions::new()).unwrap();

            for _ in 0..advances {
                coordinator.on_round_advance(&mut engine, [&mut store]);
            }
            prop_assert!(store.has("prone"));
            prop_assert_eq!(store.len(), 1);
        }

        #[test]
        fn prop_reapply_without_duration_keeps_one_instance(times in 1usize..10) {
            let mut engine = engine();
            let mut store = ConditionStore::new("hero");
            for _ in 0..times {
                engine.apply(&mut store, "bleeding", ApplyOptions::new()).unwrap();
            }
            prop_assert_eq!(store.len(), 1);
        }
    }
}
