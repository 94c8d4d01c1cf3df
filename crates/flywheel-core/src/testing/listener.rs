use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Notify, RwLock};

use crate::error::{FlywheelError, Result};
use crate::listener::TriggerListener;
use crate::storage::BoxFuture;
use crate::trigger::{Trigger, TriggerParameters};
use crate::workflow::{Workflow, WorkflowId};

/// How a [`RecordingListener`] responds to the next events.
#[derive(Clone)]
pub enum ListenerBehavior {
    /// Accept the event.
    Succeed,
    /// Fail with a generic trigger error.
    Fail(String),
    /// Fail with the idempotent-conflict signal.
    Conflict,
    /// Record the event, then hold the call until the notify fires.
    BlockUntil(Arc<Notify>),
}

/// One delivered trigger event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTrigger {
    pub workflow_id: WorkflowId,
    pub trigger: Trigger,
    pub instant: DateTime<Utc>,
    pub parameters: TriggerParameters,
}

/// A [`TriggerListener`] that records every event and responds per a
/// scripted behavior.
pub struct RecordingListener {
    behavior: RwLock<ListenerBehavior>,
    failing: RwLock<Vec<WorkflowId>>,
    events: RwLock<Vec<RecordedTrigger>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            behavior: RwLock::new(ListenerBehavior::Succeed),
            failing: RwLock::new(Vec::new()),
            events: RwLock::new(Vec::new()),
        })
    }

    /// Script how subsequent events are answered.
    pub async fn set_behavior(&self, behavior: ListenerBehavior) {
        *self.behavior.write().await = behavior;
    }

    /// Fail events for one workflow regardless of the scripted behavior.
    pub async fn fail_for(&self, id: WorkflowId) {
        self.failing.write().await.push(id);
    }

    /// All recorded events, in delivery order.
    pub async fn events(&self) -> Vec<RecordedTrigger> {
        self.events.read().await.clone()
    }

    /// Number of recorded events.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }
}

impl TriggerListener for RecordingListener {
    fn event<'a>(
        &'a self,
        workflow: &'a Workflow,
        trigger: Trigger,
        instant: DateTime<Utc>,
        parameters: TriggerParameters,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.events.write().await.push(RecordedTrigger {
                workflow_id: workflow.id(),
                trigger,
                instant,
                parameters,
            });

            if self.failing.read().await.contains(&workflow.id()) {
                return Err(FlywheelError::Trigger(format!(
                    "listener rejected {}",
                    workflow.id()
                )));
            }

            let behavior = self.behavior.read().await.clone();
            match behavior {
                ListenerBehavior::Succeed => Ok(()),
                ListenerBehavior::Fail(msg) => Err(FlywheelError::Trigger(msg)),
                ListenerBehavior::Conflict => Err(FlywheelError::AlreadyInitialized(
                    workflow.id().to_string(),
                )),
                ListenerBehavior::BlockUntil(notify) => {
                    notify.notified().await;
                    Ok(())
                }
            }
        })
    }
}
