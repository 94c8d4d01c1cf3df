use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use flywheel_core::listener::TriggerListener;
use flywheel_core::storage::Storage;
use flywheel_core::trigger::{Trigger, TriggerInstantSpec, TriggerParameters};
use flywheel_core::workflow::{ExecutionMode, Workflow, WorkflowId};

/// Injectable clock, defaulting to `Utc::now`.
pub type Time = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Configuration for the trigger manager's driver loop.
#[derive(Debug, Clone)]
pub struct TriggerManagerConfig {
    /// How often `tick` runs when driven by [`TriggerManager::run`].
    pub tick_interval: Duration,
}

impl Default for TriggerManagerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
        }
    }
}

/// Reconciles due natural triggers against persisted schedule state.
///
/// Each `tick` reads a fresh snapshot from storage, fires the listener for
/// every due and enabled workflow, and advances the persisted next-trigger
/// spec for each workflow whose side effect is known to have occurred (or is
/// exempt from firing). Workflows are processed sequentially within a tick;
/// a failure for one workflow never blocks the rest of the batch.
///
/// No internal lock serializes overlapping ticks. If two ticks run
/// concurrently, both can observe the same due instant and fire the
/// listener; the listener's idempotent-conflict signal is the only safety
/// net for that race. Deployments wanting true exclusion must guarantee a
/// single active instance externally.
pub struct TriggerManager {
    storage: Arc<dyn Storage>,
    listener: Arc<dyn TriggerListener>,
    time: Time,
    config: TriggerManagerConfig,
}

impl TriggerManager {
    /// Create a new trigger manager using the wall clock.
    pub fn new(
        storage: Arc<dyn Storage>,
        listener: Arc<dyn TriggerListener>,
        config: TriggerManagerConfig,
    ) -> Self {
        Self {
            storage,
            listener,
            time: Arc::new(Utc::now),
            config,
        }
    }

    /// Replace the clock, for deterministic tests.
    pub fn with_time(mut self, time: Time) -> Self {
        self.time = time;
        self
    }

    /// Run ticks at a fixed interval until the token is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.tick_interval);

        tracing::info!(
            tick_interval = ?self.config.tick_interval,
            "Trigger manager started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => self.tick().await,
                _ = shutdown.cancelled() => {
                    tracing::info!("Trigger manager shutting down");
                    break;
                }
            }
        }
    }

    /// Run one reconciliation cycle.
    ///
    /// A storage read failure aborts the whole cycle with no side effects;
    /// the next tick retries from a fresh snapshot.
    pub async fn tick(&self) {
        let config = match self.storage.global_config().await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read global config, skipping trigger cycle");
                return;
            }
        };

        if !config.global_enabled {
            tracing::debug!("Triggering is globally disabled");
            return;
        }

        let candidates = match self.storage.workflows_with_next_trigger().await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read next-trigger specs, skipping trigger cycle");
                return;
            }
        };

        let enabled = match self.storage.enabled_workflows().await {
            Ok(enabled) => enabled,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read enabled workflows, skipping trigger cycle");
                return;
            }
        };

        let now = (self.time)();
        for (workflow, spec) in candidates {
            if !spec.is_due(now) {
                continue;
            }
            self.try_trigger(&workflow, &spec, &enabled).await;
        }
    }

    /// Fire and advance a single due workflow. Errors are logged here so one
    /// workflow's failure cannot abort the rest of the cycle.
    async fn try_trigger(
        &self,
        workflow: &Workflow,
        spec: &TriggerInstantSpec,
        enabled: &HashSet<WorkflowId>,
    ) {
        let id = workflow.id();

        if !enabled.contains(&id) {
            // Enablement gates firing only, not the schedule clock.
            self.advance(workflow, spec.instant()).await;
            return;
        }

        if workflow.configuration.execution_mode == ExecutionMode::External {
            tracing::info!(workflow = %id, "Skip triggering externally orchestrated workflow");
            self.advance(workflow, spec.instant()).await;
            return;
        }

        let result = self
            .listener
            .event(
                workflow,
                Trigger::Natural,
                spec.instant(),
                TriggerParameters::zero(),
            )
            .await;

        match result {
            Ok(()) => {}
            Err(e) if e.is_already_initialized() => {
                tracing::debug!(
                    workflow = %id,
                    instant = %spec.instant(),
                    "Trigger already initialized, advancing"
                );
            }
            Err(e) => {
                tracing::warn!(
                    workflow = %id,
                    instant = %spec.instant(),
                    error = %e,
                    "Failed to trigger workflow, will retry next cycle"
                );
                return;
            }
        }

        self.advance(workflow, spec.instant()).await;
    }

    /// Replace the workflow's persisted spec with the one after `due`.
    async fn advance(&self, workflow: &Workflow, due: DateTime<Utc>) {
        let id = workflow.id();

        let Some(next) = workflow.configuration.next_trigger_spec(due) else {
            tracing::error!(
                workflow = %id,
                instant = %due,
                "Schedule has no occurrence after the due instant, cannot advance"
            );
            return;
        };

        // The write is idempotent; a lost update is retried naturally when
        // the same instant comes up due again next cycle.
        if let Err(e) = self.storage.update_next_trigger(&id, next).await {
            tracing::warn!(workflow = %id, error = %e, "Failed to persist next trigger");
        }
    }
}
