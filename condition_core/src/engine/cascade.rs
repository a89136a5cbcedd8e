//! Compound condition cascades
//!
//! Cascade steps run depth-first in the parent's declared order. Each step is
//! independent: a failing step is recorded and skipped, later steps still run.

use super::{ApplyReport, ConditionEngine, RemoveReport};
use crate::error::{CascadeStepFailed, ConditionError};
use crate::persistence::ConditionPersistence;
use crate::store::ConditionStore;
use crate::types::ConditionInstance;
use catalog_core::{ConditionCatalog, ConditionDefinition, ConditionId};
use tracing::{debug, warn};

impl<P: ConditionPersistence> ConditionEngine<P> {
    pub(super) fn apply_implied(
        &mut self,
        catalog: &ConditionCatalog,
        store: &mut ConditionStore,
        parent: &ConditionDefinition,
        source_ref: Option<&str>,
        depth: u32,
        report: &mut ApplyReport,
    ) {
        if !parent.is_compound() {
            return;
        }
        if depth > self.max_cascade_depth {
            warn!(
                actor = %store.actor_id(),
                condition = %parent.id,
                depth,
                "cascade depth limit reached"
            );
            return;
        }

        for child_id in &parent.implied_conditions {
            let Some(child) = catalog.get(child_id.as_str()) else {
                record_failure(
                    &mut report.cascade_failures,
                    store,
                    &parent.id,
                    child_id,
                    ConditionError::UnknownCondition(child_id.clone()),
                );
                continue;
            };

            // Active either independently or through another parent
            if store.has(child_id.as_str()) {
                continue;
            }

            let instance = ConditionInstance::new(child_id.clone())
                .with_source(source_ref.map(str::to_string))
                .implied(parent.id.clone());
            if let Err(e) = self.persistence.upsert_condition(store.actor_id(), &instance) {
                record_failure(
                    &mut report.cascade_failures,
                    store,
                    &parent.id,
                    child_id,
                    e.into(),
                );
                continue;
            }
            store.upsert(instance);

            debug!(
                actor = %store.actor_id(),
                condition = %child_id,
                implied_by = %parent.id,
                "implied condition applied"
            );
            report.cascade.push(child_id.clone());
            self.apply_implied(catalog, store, child, source_ref, depth + 1, report);
        }
    }

    pub(super) fn remove_implied(
        &mut self,
        catalog: &ConditionCatalog,
        store: &mut ConditionStore,
        parent_id: &str,
        depth: u32,
        report: &mut RemoveReport,
    ) {
        if depth > self.max_cascade_depth {
            warn!(
                actor = %store.actor_id(),
                condition = parent_id,
                depth,
                "cascade depth limit reached"
            );
            return;
        }

        let mut children: Vec<ConditionInstance> = store
            .list_active()
            .iter()
            .filter(|i| i.implied_by.as_ref().is_some_and(|p| p.as_str() == parent_id))
            .cloned()
            .collect();
        if let Some(parent) = catalog.get(parent_id) {
            // Stable sort: ids the parent does not declare keep store order
            children.sort_by_key(|child| {
                parent
                    .implied_conditions
                    .iter()
                    .position(|id| id == &child.condition_id)
                    .unwrap_or(usize::MAX)
            });
        }

        for child in children {
            let parent_key = ConditionId::from(parent_id);

            let other_parent = catalog
                .implying(child.condition_id.as_str())
                .find(|def| def.id.as_str() != parent_id && store.has(def.id.as_str()))
                .map(|def| def.id.clone());

            if let Some(new_parent) = other_parent {
                let reparented = ConditionInstance {
                    implied_by: Some(new_parent.clone()),
                    ..child.clone()
                };
                store.upsert(reparented.clone());
                if let Err(e) = self
                    .persistence
                    .upsert_condition(store.actor_id(), &reparented)
                {
                    record_failure(
                        &mut report.cascade_failures,
                        store,
                        &parent_key,
                        &child.condition_id,
                        e.into(),
                    );
                }
                debug!(
                    actor = %store.actor_id(),
                    condition = %child.condition_id,
                    implied_by = %new_parent,
                    "implied condition re-parented"
                );
                report.reparented.push(child.condition_id);
                continue;
            }

            store.delete(child.condition_id.as_str());
            if let Err(e) = self
                .persistence
                .delete_condition(store.actor_id(), &child.condition_id)
            {
                record_failure(
                    &mut report.cascade_failures,
                    store,
                    &parent_key,
                    &child.condition_id,
                    e.into(),
                );
            }
            debug!(
                actor = %store.actor_id(),
                condition = %child.condition_id,
                "implied condition removed"
            );
            report.cascade.push(child.condition_id.clone());
            self.remove_implied(catalog, store, child.condition_id.as_str(), depth + 1, report);
        }
    }
}

fn record_failure(
    failures: &mut Vec<CascadeStepFailed>,
    store: &ConditionStore,
    parent: &ConditionId,
    condition: &ConditionId,
    reason: ConditionError,
) {
    let failure = CascadeStepFailed {
        parent: parent.clone(),
        condition: condition.clone(),
        reason,
    };
    warn!(actor = %store.actor_id(), "{}", failure);
    failures.push(failure);
}
