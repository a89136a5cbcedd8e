//! condition_core - Condition and turn-lifecycle engine for tabletop actors
//!
//! This library provides:
//! - ConditionStore: Active condition instances owned by one actor
//! - ConditionEngine: Apply/remove/toggle with compound cascades
//! - Modifier aggregation: Condition contributions to rolls and targets
//! - TurnLifecycleCoordinator: Turn start/end effects and round decay
//!
//! # Quick Start
//!
//! ```rust
//! use condition_core::prelude::*;
//! use std::sync::Arc;
//!
//! let catalog = ConditionCatalog::builtin().unwrap();
//! let mut engine = ConditionEngine::new(Arc::new(catalog));
//! let mut coordinator = TurnLifecycleCoordinator::new();
//!
//! let mut hero = ConditionStore::new("hero");
//! engine.apply(&mut hero, "poisoned", ApplyOptions::for_rounds(2)).unwrap();
//!
//! // Before rolling an attack
//! let mods = engine.get_modifiers(&hero, RollType::Attack, RollContext::melee());
//! assert_eq!(mods.total, -2);
//!
//! // Combat driver signals
//! let end = coordinator.on_turn_end(&engine, &hero, VitalSigns::healthy());
//! assert_eq!(end.trauma_taken, 1);
//! let round = coordinator.on_round_advance(&mut engine, [&mut hero]);
//! assert!(round.decay_failures.is_empty());
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod modifiers;
pub mod persistence;
pub mod prelude;
pub mod store;
pub mod turn;
pub mod types;

// Core API - what most users need
pub use engine::{ApplyOutcome, ApplyReport, ConditionEngine, DecayReport, RemoveReport};
pub use store::ConditionStore;
pub use turn::{
    LifecycleEvent, RoundAdvanceReport, TurnEndReport, TurnLifecycleCoordinator, TurnPhase,
    TurnStartReport,
};
pub use types::{
    ActiveCondition, ActiveFlags, ActorId, ApplyOptions, ConditionInstance, ModifierTotal,
    RollContext, RollType, TargetModifiers, VitalSigns,
};

// Errors
pub use error::{CascadeStepFailed, ConditionError, DecayStepFailed, PersistenceError};

// Configuration
pub use config::EngineConfig;

// Collaborators
pub use persistence::{ConditionPersistence, MemoryPersistence, NullPersistence};

// Re-export the catalog types needed to build an engine
pub use catalog_core::{ConditionCatalog, ConditionDefinition, ConditionId};
