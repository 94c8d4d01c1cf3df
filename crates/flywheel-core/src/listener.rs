use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::storage::BoxFuture;
use crate::trigger::{Trigger, TriggerParameters};
use crate::workflow::Workflow;

/// Downstream consumer of trigger events.
///
/// The scheduler awaits each call to completion before advancing the
/// workflow's schedule state. An error of kind
/// [`FlywheelError::AlreadyInitialized`](crate::FlywheelError::AlreadyInitialized)
/// means the effect already happened on a prior attempt and is treated as
/// success; any other error leaves the schedule unadvanced so the same due
/// instant is re-offered next cycle.
pub trait TriggerListener: Send + Sync {
    /// Deliver a trigger event for the given workflow and due instant.
    fn event<'a>(
        &'a self,
        workflow: &'a Workflow,
        trigger: Trigger,
        instant: DateTime<Utc>,
        parameters: TriggerParameters,
    ) -> BoxFuture<'a, Result<()>>;
}
