//! Persistence contracts for actor condition state
//!
//! The host owns real storage. The engine mirrors every store mutation
//! through a [`ConditionPersistence`] implementation and propagates its
//! failures without retrying.

use crate::error::PersistenceError;
use crate::types::{ActorId, ConditionInstance};
use catalog_core::ConditionId;
use std::collections::{HashMap, HashSet};

/// External store of active condition instances
pub trait ConditionPersistence {
    /// All instances recorded for an actor
    fn list_active_conditions(
        &self,
        actor_id: &ActorId,
    ) -> Result<Vec<ConditionInstance>, PersistenceError>;

    /// Insert or overwrite the instance with the same condition id
    fn upsert_condition(
        &mut self,
        actor_id: &ActorId,
        instance: &ConditionInstance,
    ) -> Result<(), PersistenceError>;

    /// Delete an instance; deleting a missing id is not an error
    fn delete_condition(
        &mut self,
        actor_id: &ActorId,
        condition_id: &ConditionId,
    ) -> Result<(), PersistenceError>;
}

impl<T: ConditionPersistence + ?Sized> ConditionPersistence for &mut T {
    fn list_active_conditions(
        &self,
        actor_id: &ActorId,
    ) -> Result<Vec<ConditionInstance>, PersistenceError> {
        (**self).list_active_conditions(actor_id)
    }

    fn upsert_condition(
        &mut self,
        actor_id: &ActorId,
        instance: &ConditionInstance,
    ) -> Result<(), PersistenceError> {
        (**self).upsert_condition(actor_id, instance)
    }

    fn delete_condition(
        &mut self,
        actor_id: &ActorId,
        condition_id: &ConditionId,
    ) -> Result<(), PersistenceError> {
        (**self).delete_condition(actor_id, condition_id)
    }
}

/// Persistence that stores nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPersistence;

impl ConditionPersistence for NullPersistence {
    fn list_active_conditions(
        &self,
        _actor_id: &ActorId,
    ) -> Result<Vec<ConditionInstance>, PersistenceError> {
        Ok(Vec::new())
    }

    fn upsert_condition(
        &mut self,
        _actor_id: &ActorId,
        _instance: &ConditionInstance,
    ) -> Result<(), PersistenceError> {
        Ok(())
    }

    fn delete_condition(
        &mut self,
        _actor_id: &ActorId,
        _condition_id: &ConditionId,
    ) -> Result<(), PersistenceError> {
        Ok(())
    }
}

/// In-memory persistence for headless hosts and tests
///
/// Writes can be made to fail globally or for specific condition ids.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    records: HashMap<ActorId, Vec<ConditionInstance>>,
    fail_all: bool,
    failing_ids: HashSet<ConditionId>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded instances for an actor, in write order
    pub fn instances(&self, actor_id: &ActorId) -> &[ConditionInstance] {
        self.records
            .get(actor_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Make every write fail (or succeed again)
    pub fn set_failing(&mut self, failing: bool) {
        self.fail_all = failing;
    }

    /// Make writes touching `condition_id` fail
    pub fn fail_condition(&mut self, condition_id: impl Into<ConditionId>) {
        self.failing_ids.insert(condition_id.into());
    }

    fn check(&self, actor_id: &ActorId, condition_id: &ConditionId) -> Result<(), PersistenceError> {
        if self.fail_all || self.failing_ids.contains(condition_id) {
            return Err(PersistenceError::new(
                actor_id,
                format!("write rejected for '{}'", condition_id),
            ));
        }
        Ok(())
    }
}

impl ConditionPersistence for MemoryPersistence {
    fn list_active_conditions(
        &self,
        actor_id: &ActorId,
    ) -> Result<Vec<ConditionInstance>, PersistenceError> {
        Ok(self.instances(actor_id).to_vec())
    }

    fn upsert_condition(
        &mut self,
        actor_id: &ActorId,
        instance: &ConditionInstance,
    ) -> Result<(), PersistenceError> {
        self.check(actor_id, &instance.condition_id)?;
        let records = self.records.entry(actor_id.clone()).or_default();
        match records
            .iter_mut()
            .find(|i| i.condition_id == instance.condition_id)
        {
            Some(existing) => *existing = instance.clone(),
            None => records.push(instance.clone()),
        }
        Ok(())
    }

    fn delete_condition(
        &mut self,
        actor_id: &ActorId,
        condition_id: &ConditionId,
    ) -> Result<(), PersistenceError> {
        self.check(actor_id, condition_id)?;
        if let Some(records) = self.records.get_mut(actor_id) {
            records.retain(|i| &i.condition_id != condition_id);
        }
        Ok(())
    }
}
