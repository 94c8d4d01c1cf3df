use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::storage::BoxFuture;
use crate::workflow::WorkflowId;

/// Context of a single execution, supplied to the router on every call.
///
/// The router only requires that a deterministic routing key can be derived
/// from it; the fields themselves are opaque to the router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    /// Workflow the execution belongs to.
    pub workflow_id: WorkflowId,
    /// The schedule instant the execution covers.
    pub parameter: DateTime<Utc>,
    /// Unique id of this execution attempt.
    pub run_id: Uuid,
}

impl RunState {
    pub fn new(workflow_id: WorkflowId, parameter: DateTime<Utc>) -> Self {
        Self {
            workflow_id,
            parameter,
            run_id: Uuid::new_v4(),
        }
    }
}

/// What to launch for an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSpec {
    /// Stable id of the launched process, used for dedup by backends.
    pub execution_id: String,
    /// Container image to run.
    pub image: String,
    /// Arguments passed to the container entrypoint.
    #[serde(default)]
    pub args: Vec<String>,
}

impl RunSpec {
    pub fn new(execution_id: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            image: image.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

/// An execution provider capable of starting, polling and releasing runs.
///
/// Backends are owned exclusively by the router that created them; only the
/// router releases their resources, via `cleanup` and `close`.
pub trait Backend: Send + Sync {
    /// Launch an execution; returns an opaque handle for it.
    fn start<'a>(&'a self, state: &'a RunState, spec: &'a RunSpec)
        -> BoxFuture<'a, Result<String>>;

    /// Refresh the state of a previously started execution.
    fn poll<'a>(&'a self, state: &'a RunState) -> BoxFuture<'a, Result<()>>;

    /// Release transient resources ahead of shutdown.
    fn cleanup(&self) -> BoxFuture<'_, Result<()>>;

    /// Release the backend's persistent resources.
    fn close(&self) -> BoxFuture<'_, Result<()>>;
}

/// Builds a backend for a routing key, invoked at most once per distinct key.
pub type BackendFactory = Arc<dyn Fn(&str) -> Result<Arc<dyn Backend>> + Send + Sync>;

/// Pure derivation of a routing key from run context.
pub type RouteKeyFn = Arc<dyn Fn(&RunState) -> String + Send + Sync>;
