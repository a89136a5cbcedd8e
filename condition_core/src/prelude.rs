//! Prelude module for convenient imports
//!
//! ```rust
//! use condition_core::prelude::*;
//! ```

// Core types
pub use crate::store::ConditionStore;
pub use crate::types::{
    ActorId, ApplyOptions, ConditionInstance, RollContext, RollType, VitalSigns,
};

// Engine
pub use crate::engine::{ApplyOutcome, ConditionEngine};

// Turn lifecycle
pub use crate::turn::{LifecycleEvent, TurnLifecycleCoordinator};

// Errors
pub use crate::error::ConditionError;

// Collaborators
pub use crate::persistence::{ConditionPersistence, MemoryPersistence, NullPersistence};

// Re-exports from catalog_core
pub use catalog_core::{ConditionCatalog, ConditionDefinition, ConditionId};
