use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use crate::config::GlobalConfig;
use crate::error::Result;
use crate::trigger::TriggerInstantSpec;
use crate::workflow::{Workflow, WorkflowId};

/// Boxed future returned by the dyn-compatible external-interface traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The persistence engine as seen by the trigger scheduler.
///
/// This trait decouples the scheduler from any concrete storage; reads are
/// retryable and the scheduler treats a read failure as "skip this cycle".
pub trait Storage: Send + Sync {
    /// Read the process-wide configuration. Never cached by callers.
    fn global_config(&self) -> BoxFuture<'_, Result<GlobalConfig>>;

    /// Read the set of workflow identities currently permitted to fire.
    fn enabled_workflows(&self) -> BoxFuture<'_, Result<HashSet<WorkflowId>>>;

    /// Read every workflow together with its persisted next-trigger spec.
    fn workflows_with_next_trigger(
        &self,
    ) -> BoxFuture<'_, Result<Vec<(Workflow, TriggerInstantSpec)>>>;

    /// Replace a workflow's persisted next-trigger spec.
    ///
    /// Idempotent when re-issued with an identical value, so a lost
    /// acknowledgement is safe to retry.
    fn update_next_trigger<'a>(
        &'a self,
        workflow_id: &'a WorkflowId,
        spec: TriggerInstantSpec,
    ) -> BoxFuture<'a, Result<()>>;
}
