//! ConditionEngine - Apply, remove and query conditions on actors
//!
//! Every mutation is written to the persistence collaborator first and only
//! then to the actor's [`ConditionStore`], so a rejected write leaves the
//! store as it was and the call can be retried. Compound conditions cascade:
//! applying one applies its implied conditions (marked `implied_by`), and
//! removing it removes them again unless they were applied independently.
//!
//! A persistence failure on the primary mutation is returned to the caller
//! before any cascade step runs. Failures on cascade steps are recorded in the report and logged; the
//! primary condition stays applied.

mod cascade;

use crate::config::{ConfigError, EngineConfig};
use crate::error::{CascadeStepFailed, ConditionError, DecayStepFailed};
use crate::persistence::{ConditionPersistence, NullPersistence};
use crate::store::ConditionStore;
use crate::types::{ActiveCondition, ApplyOptions, ConditionInstance};
use catalog_core::{ConditionCatalog, ConditionDefinition, ConditionId};
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of a primary `apply` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The condition was not active and has been created
    Applied(ConditionInstance),
    /// Already active; duration refreshed or promoted to independent
    Updated(ConditionInstance),
    /// Already active and nothing to change
    AlreadyActiveNoChange,
}

impl ApplyOutcome {
    /// The resulting instance, if the call changed anything
    pub fn instance(&self) -> Option<&ConditionInstance> {
        match self {
            ApplyOutcome::Applied(i) | ApplyOutcome::Updated(i) => Some(i),
            ApplyOutcome::AlreadyActiveNoChange => None,
        }
    }
}

/// Everything an `apply` call did, including its cascade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    pub outcome: ApplyOutcome,
    /// Implied conditions applied by the cascade, in application order
    pub cascade: Vec<ConditionId>,
    pub cascade_failures: Vec<CascadeStepFailed>,
}

impl ApplyReport {
    fn new(outcome: ApplyOutcome) -> Self {
        ApplyReport {
            outcome,
            cascade: Vec::new(),
            cascade_failures: Vec::new(),
        }
    }
}

/// Everything a `remove` call did, including its cascade
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoveReport {
    /// The removed instance; `None` when the condition was not active
    pub removed: Option<ConditionInstance>,
    /// Implied conditions removed along with it
    pub cascade: Vec<ConditionId>,
    /// Implied conditions kept because another active condition implies them
    pub reparented: Vec<ConditionId>,
    pub cascade_failures: Vec<CascadeStepFailed>,
}

/// Result of one round of duration decay on a single actor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecayReport {
    /// Conditions whose duration ran out
    pub expired: Vec<ConditionId>,
    /// Implied conditions removed because their parent expired
    pub removed_by_cascade: Vec<ConditionId>,
    pub cascade_failures: Vec<CascadeStepFailed>,
    /// Instances left as they were because a write was rejected
    pub decay_failures: Vec<DecayStepFailed>,
}

/// Condition rules engine bound to a catalog and a persistence collaborator
#[derive(Debug, Clone)]
pub struct ConditionEngine<P = NullPersistence> {
    catalog: Arc<ConditionCatalog>,
    persistence: P,
    max_cascade_depth: u32,
}

impl ConditionEngine<NullPersistence> {
    /// Create an engine that does not persist anything
    pub fn new(catalog: Arc<ConditionCatalog>) -> Self {
        Self::with_persistence(catalog, NullPersistence)
    }
}

impl<P: ConditionPersistence> ConditionEngine<P> {
    pub fn with_persistence(catalog: Arc<ConditionCatalog>, persistence: P) -> Self {
        ConditionEngine {
            catalog,
            persistence,
            max_cascade_depth: EngineConfig::default().max_cascade_depth,
        }
    }

    /// Build an engine from settings, loading the configured catalog
    pub fn from_config(config: &EngineConfig, persistence: P) -> Result<Self, ConfigError> {
        let catalog = config.load_catalog()?;
        Ok(Self::with_persistence(Arc::new(catalog), persistence)
            .with_max_cascade_depth(config.max_cascade_depth))
    }

    pub fn with_max_cascade_depth(mut self, depth: u32) -> Self {
        self.max_cascade_depth = depth;
        self
    }

    pub fn catalog(&self) -> &ConditionCatalog {
        &self.catalog
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    pub fn persistence_mut(&mut self) -> &mut P {
        &mut self.persistence
    }

    pub fn into_persistence(self) -> P {
        self.persistence
    }

    fn definition(&self, condition_id: &str) -> Result<&ConditionDefinition, ConditionError> {
        self.catalog
            .get(condition_id)
            .ok_or_else(|| ConditionError::UnknownCondition(ConditionId::from(condition_id)))
    }

    /// Apply a condition to an actor
    ///
    /// Re-applying an active condition refreshes its duration when one is
    /// given, and promotes a cascade-applied instance to an independent one.
    /// Otherwise it is a no-op.
    pub fn apply(
        &mut self,
        store: &mut ConditionStore,
        condition_id: &str,
        options: ApplyOptions,
    ) -> Result<ApplyReport, ConditionError> {
        let catalog = Arc::clone(&self.catalog);
        let def = catalog
            .get(condition_id)
            .ok_or_else(|| ConditionError::UnknownCondition(ConditionId::from(condition_id)))?;

        if let Some(existing) = store.get(condition_id).cloned() {
            let mut updated = existing.clone();
            if updated.implied_by.take().is_some() && options.source_ref.is_some() {
                updated.source_ref = options.source_ref;
            }
            if let Some(rounds) = options.duration_rounds {
                updated.duration_rounds = Some(rounds);
            }

            if updated == existing {
                return Ok(ApplyReport::new(ApplyOutcome::AlreadyActiveNoChange));
            }

            self.persistence.upsert_condition(store.actor_id(), &updated)?;
            store.upsert(updated.clone());
            debug!(
                actor = %store.actor_id(),
                condition = condition_id,
                duration = ?updated.duration_rounds,
                "condition updated"
            );
            return Ok(ApplyReport::new(ApplyOutcome::Updated(updated)));
        }

        let instance = ConditionInstance::new(def.id.clone())
            .with_duration(options.duration_rounds)
            .with_source(options.source_ref);
        self.persistence.upsert_condition(store.actor_id(), &instance)?;
        store.upsert(instance.clone());
        debug!(
            actor = %store.actor_id(),
            condition = condition_id,
            duration = ?instance.duration_rounds,
            "condition applied"
        );

        let mut report = ApplyReport::new(ApplyOutcome::Applied(instance.clone()));
        self.apply_implied(
            &catalog,
            store,
            def,
            instance.source_ref.as_deref(),
            1,
            &mut report,
        );
        Ok(report)
    }

    /// Remove a condition and every instance it implied
    ///
    /// Implied instances that were also applied independently stay active.
    /// Removing a condition that is not active is a no-op.
    pub fn remove(
        &mut self,
        store: &mut ConditionStore,
        condition_id: &str,
    ) -> Result<RemoveReport, ConditionError> {
        self.definition(condition_id)?;
        self.remove_active(store, condition_id)
    }

    /// Apply the condition if inactive, remove it if active
    ///
    /// Returns whether the condition is active afterwards.
    pub fn toggle(
        &mut self,
        store: &mut ConditionStore,
        condition_id: &str,
        options: ApplyOptions,
    ) -> Result<bool, ConditionError> {
        self.definition(condition_id)?;
        if store.has(condition_id) {
            self.remove_active(store, condition_id)?;
            Ok(false)
        } else {
            self.apply(store, condition_id, options)?;
            Ok(true)
        }
    }

    /// Active instances paired with their definitions, in insertion order
    ///
    /// Instances whose id is missing from the catalog (stale persisted
    /// state) are skipped.
    pub fn get_active<'a>(&'a self, store: &'a ConditionStore) -> Vec<ActiveCondition<'a>> {
        store
            .list_active()
            .iter()
            .filter_map(|instance| match self.catalog.get(instance.condition_id.as_str()) {
                Some(definition) => Some(ActiveCondition {
                    instance,
                    definition,
                }),
                None => {
                    warn!(
                        actor = %store.actor_id(),
                        condition = %instance.condition_id,
                        "active condition missing from catalog"
                    );
                    None
                }
            })
            .collect()
    }

    /// Remove every active condition flagged `lost_on_attack`
    ///
    /// Call once an attack that relied on such a condition has resolved.
    pub fn consume_on_attack(
        &mut self,
        store: &mut ConditionStore,
    ) -> Result<Vec<ConditionId>, ConditionError> {
        let consumed: Vec<ConditionId> = self
            .get_active(store)
            .iter()
            .filter(|active| active.definition.flags.lost_on_attack)
            .map(|active| active.id().clone())
            .collect();

        for id in &consumed {
            self.remove_active(store, id.as_str())?;
        }
        Ok(consumed)
    }

    /// Advance every finite duration on one actor by a round
    ///
    /// Instances reaching zero are removed with their cascade. An instance
    /// removed by an earlier cascade in the same pass is not decayed again.
    /// A rejected write leaves that instance untouched for this round and is
    /// recorded in the report; the other instances still decay.
    pub fn decay(&mut self, store: &mut ConditionStore) -> DecayReport {
        let mut report = DecayReport::default();

        for id in store.active_ids() {
            let Some(instance) = store.get(id.as_str()).cloned() else {
                continue;
            };
            let Some(rounds) = instance.duration_rounds else {
                continue;
            };

            let remaining = rounds.saturating_sub(1);
            if remaining == 0 {
                match self.remove_active(store, id.as_str()) {
                    Ok(removed) => {
                        debug!(actor = %store.actor_id(), condition = %id, "condition expired");
                        report.removed_by_cascade.extend(removed.cascade);
                        report.cascade_failures.extend(removed.cascade_failures);
                        report.expired.push(id);
                    }
                    Err(e) => record_decay_failure(&mut report, store, id, e),
                }
            } else {
                let updated = instance.with_duration(Some(remaining));
                match self.persistence.upsert_condition(store.actor_id(), &updated) {
                    Ok(()) => store.upsert(updated),
                    Err(e) => record_decay_failure(&mut report, store, id, e.into()),
                }
            }
        }

        report
    }

    /// Remove every instance an actor holds, e.g. when the actor is deleted
    pub fn release_actor(&mut self, mut store: ConditionStore) -> Result<(), ConditionError> {
        for id in store.active_ids() {
            self.persistence.delete_condition(store.actor_id(), &id)?;
            store.delete(id.as_str());
        }
        debug!(actor = %store.actor_id(), "actor conditions released");
        Ok(())
    }

    fn remove_active(
        &mut self,
        store: &mut ConditionStore,
        condition_id: &str,
    ) -> Result<RemoveReport, ConditionError> {
        let Some(active) = store.get(condition_id) else {
            return Ok(RemoveReport::default());
        };
        let condition_key = active.condition_id.clone();
        self.persistence
            .delete_condition(store.actor_id(), &condition_key)?;
        let removed = store.delete(condition_id);
        debug!(actor = %store.actor_id(), condition = condition_id, "condition removed");

        let catalog = Arc::clone(&self.catalog);
        let mut report = RemoveReport {
            removed,
            ..Default::default()
        };
        self.remove_implied(&catalog, store, condition_id, 1, &mut report);
        Ok(report)
    }
}

fn record_decay_failure(
    report: &mut DecayReport,
    store: &ConditionStore,
    condition: ConditionId,
    reason: ConditionError,
) {
    let failure = DecayStepFailed {
        actor_id: store.actor_id().clone(),
        condition,
        reason,
    };
    warn!("{}", failure);
    report.decay_failures.push(failure);
}
