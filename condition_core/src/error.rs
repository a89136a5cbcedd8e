//! Error types for condition operations

use crate::types::ActorId;
use catalog_core::ConditionId;
use thiserror::Error;

/// Error applying, removing or decaying conditions
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConditionError {
    /// The id is not in the catalog; the store is left untouched
    #[error("Unknown condition: {0}")]
    UnknownCondition(ConditionId),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Failure reported by the external condition store
///
/// Propagated verbatim; the engine never retries.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Persistence error for actor '{actor_id}': {message}")]
pub struct PersistenceError {
    pub actor_id: ActorId,
    pub message: String,
}

impl PersistenceError {
    pub fn new(actor_id: &ActorId, message: impl Into<String>) -> Self {
        PersistenceError {
            actor_id: actor_id.clone(),
            message: message.into(),
        }
    }
}

/// An implied condition could not be applied or removed
///
/// Recorded in operation reports; the primary operation still stands.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Cascade step '{parent}' -> '{condition}' failed: {reason}")]
pub struct CascadeStepFailed {
    pub parent: ConditionId,
    pub condition: ConditionId,
    #[source]
    pub reason: ConditionError,
}

/// A duration could not be advanced for one instance
///
/// The instance keeps its previous duration for this round.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Decay of '{condition}' on '{actor_id}' failed: {reason}")]
pub struct DecayStepFailed {
    pub actor_id: ActorId,
    pub condition: ConditionId,
    #[source]
    pub reason: ConditionError,
}
