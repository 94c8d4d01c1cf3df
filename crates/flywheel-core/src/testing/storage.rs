use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::GlobalConfig;
use crate::error::{FlywheelError, Result};
use crate::storage::{BoxFuture, Storage};
use crate::trigger::TriggerInstantSpec;
use crate::workflow::{Workflow, WorkflowId};

/// In-memory [`Storage`] with per-read failure injection.
///
/// `update_next_trigger` both records the call and applies it to the stored
/// trigger mapping, so multi-cycle tests observe advancement.
#[derive(Default)]
pub struct MemStorage {
    config: RwLock<GlobalConfig>,
    enabled: RwLock<HashSet<WorkflowId>>,
    triggers: RwLock<Vec<(Workflow, TriggerInstantSpec)>>,
    updates: RwLock<Vec<(WorkflowId, TriggerInstantSpec)>>,
    fail_config_reads: AtomicBool,
    fail_enabled_reads: AtomicBool,
    fail_trigger_reads: AtomicBool,
    fail_updates: AtomicBool,
}

impl MemStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Flip the stored global enablement flag.
    pub async fn set_global_enabled(&self, enabled: bool) {
        self.config.write().await.global_enabled = enabled;
    }

    /// Register a workflow with its current next-trigger spec.
    pub async fn insert_workflow(&self, workflow: Workflow, spec: TriggerInstantSpec) {
        self.triggers.write().await.push((workflow, spec));
    }

    /// Mark a workflow as enabled.
    pub async fn enable(&self, id: WorkflowId) {
        self.enabled.write().await.insert(id);
    }

    /// Make `global_config` reads fail until reset.
    pub fn fail_config_reads(&self, fail: bool) {
        self.fail_config_reads.store(fail, Ordering::SeqCst);
    }

    /// Make enabled-set reads fail until reset.
    pub fn fail_enabled_reads(&self, fail: bool) {
        self.fail_enabled_reads.store(fail, Ordering::SeqCst);
    }

    /// Make trigger-mapping reads fail until reset.
    pub fn fail_trigger_reads(&self, fail: bool) {
        self.fail_trigger_reads.store(fail, Ordering::SeqCst);
    }

    /// Make `update_next_trigger` fail until reset.
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// All recorded `update_next_trigger` calls, in order.
    pub async fn updates(&self) -> Vec<(WorkflowId, TriggerInstantSpec)> {
        self.updates.read().await.clone()
    }

    /// The currently stored spec for a workflow, if registered.
    pub async fn spec_for(&self, id: &WorkflowId) -> Option<TriggerInstantSpec> {
        self.triggers
            .read()
            .await
            .iter()
            .find(|(w, _)| &w.id() == id)
            .map(|(_, spec)| *spec)
    }
}

impl Storage for MemStorage {
    fn global_config(&self) -> BoxFuture<'_, Result<GlobalConfig>> {
        Box::pin(async move {
            if self.fail_config_reads.load(Ordering::SeqCst) {
                return Err(FlywheelError::Storage("config read failed".into()));
            }
            Ok(self.config.read().await.clone())
        })
    }

    fn enabled_workflows(&self) -> BoxFuture<'_, Result<HashSet<WorkflowId>>> {
        Box::pin(async move {
            if self.fail_enabled_reads.load(Ordering::SeqCst) {
                return Err(FlywheelError::Storage("enabled read failed".into()));
            }
            Ok(self.enabled.read().await.clone())
        })
    }

    fn workflows_with_next_trigger(
        &self,
    ) -> BoxFuture<'_, Result<Vec<(Workflow, TriggerInstantSpec)>>> {
        Box::pin(async move {
            if self.fail_trigger_reads.load(Ordering::SeqCst) {
                return Err(FlywheelError::Storage("trigger read failed".into()));
            }
            Ok(self.triggers.read().await.clone())
        })
    }

    fn update_next_trigger<'a>(
        &'a self,
        workflow_id: &'a WorkflowId,
        spec: TriggerInstantSpec,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if self.fail_updates.load(Ordering::SeqCst) {
                return Err(FlywheelError::Storage("update failed".into()));
            }
            self.updates.write().await.push((workflow_id.clone(), spec));
            let mut triggers = self.triggers.write().await;
            if let Some(entry) = triggers.iter_mut().find(|(w, _)| &w.id() == workflow_id) {
                entry.1 = spec;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio_test::{assert_err, assert_ok};

    use crate::schedule::Schedule;
    use crate::workflow::WorkflowConfiguration;

    fn daily_workflow() -> Workflow {
        Workflow::new(
            "comp",
            WorkflowConfiguration {
                id: "daily-report".into(),
                schedule: Schedule::Days,
                offset_seconds: None,
                execution_mode: Default::default(),
            },
        )
    }

    #[tokio::test]
    async fn test_update_applies_to_stored_spec() {
        let storage = MemStorage::new();
        let workflow = daily_workflow();
        let due = "2016-10-01T00:00:00Z".parse().unwrap();
        let spec = TriggerInstantSpec::new(due, due);
        storage.insert_workflow(workflow.clone(), spec).await;

        let advanced =
            TriggerInstantSpec::new("2016-10-02T00:00:00Z".parse().unwrap(), due);
        storage
            .update_next_trigger(&workflow.id(), advanced)
            .await
            .unwrap();

        assert_eq!(storage.spec_for(&workflow.id()).await, Some(advanced));
        assert_eq!(storage.updates().await, vec![(workflow.id(), advanced)]);
    }

    #[tokio::test]
    async fn test_failure_injection_is_resettable() {
        let storage = MemStorage::new();
        storage.fail_config_reads(true);
        assert_err!(storage.global_config().await);

        storage.fail_config_reads(false);
        assert_ok!(storage.global_config().await);

        storage.fail_trigger_reads(true);
        assert_ok!(storage.enabled_workflows().await);
        assert_err!(storage.workflows_with_next_trigger().await);

        storage.fail_enabled_reads(true);
        assert_err!(storage.enabled_workflows().await);
    }
}
