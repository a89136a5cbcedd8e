//! ConditionStore - Per-actor collection of active condition instances
//!
//! Holds at most one instance per condition id. Instances are kept in
//! insertion order; overwriting an instance keeps its position.

use crate::error::PersistenceError;
use crate::persistence::ConditionPersistence;
use crate::types::{ActorId, ConditionInstance};
use catalog_core::ConditionId;
use tracing::warn;

/// Active conditions owned by a single actor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionStore {
    actor_id: ActorId,
    instances: Vec<ConditionInstance>,
}

impl ConditionStore {
    /// Create an empty store for an actor
    pub fn new(actor_id: impl Into<ActorId>) -> Self {
        ConditionStore {
            actor_id: actor_id.into(),
            instances: Vec::new(),
        }
    }

    /// Rebuild a store from the external persistence layer
    ///
    /// Duplicate records for the same condition id collapse into one; the
    /// last record wins.
    pub fn hydrate<P: ConditionPersistence + ?Sized>(
        actor_id: impl Into<ActorId>,
        persistence: &P,
    ) -> Result<Self, PersistenceError> {
        let mut store = Self::new(actor_id);
        for instance in persistence.list_active_conditions(&store.actor_id)? {
            if store.has(instance.condition_id.as_str()) {
                warn!(
                    actor = %store.actor_id,
                    condition = %instance.condition_id,
                    "duplicate persisted condition collapsed"
                );
            }
            store.upsert(instance);
        }
        Ok(store)
    }

    pub fn actor_id(&self) -> &ActorId {
        &self.actor_id
    }

    pub fn has(&self, condition_id: &str) -> bool {
        self.position(condition_id).is_some()
    }

    pub fn get(&self, condition_id: &str) -> Option<&ConditionInstance> {
        self.instances
            .iter()
            .find(|i| i.condition_id.as_str() == condition_id)
    }

    /// Active instances in insertion order
    pub fn list_active(&self) -> &[ConditionInstance] {
        &self.instances
    }

    /// Ids of active instances in insertion order
    pub fn active_ids(&self) -> Vec<ConditionId> {
        self.instances
            .iter()
            .map(|i| i.condition_id.clone())
            .collect()
    }

    /// Insert an instance or overwrite the one with the same condition id
    pub fn upsert(&mut self, instance: ConditionInstance) {
        match self.position(instance.condition_id.as_str()) {
            Some(idx) => self.instances[idx] = instance,
            None => self.instances.push(instance),
        }
    }

    /// Remove an instance, returning it if it was present
    pub fn delete(&mut self, condition_id: &str) -> Option<ConditionInstance> {
        self.position(condition_id)
            .map(|idx| self.instances.remove(idx))
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    fn position(&self, condition_id: &str) -> Option<usize> {
        self.instances
            .iter()
            .position(|i| i.condition_id.as_str() == condition_id)
    }
}
