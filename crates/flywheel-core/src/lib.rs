pub mod backend;
pub mod config;
pub mod error;
pub mod listener;
pub mod schedule;
pub mod storage;
pub mod trigger;
pub mod workflow;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backend::{Backend, BackendFactory, RouteKeyFn, RunSpec, RunState};
pub use config::GlobalConfig;
pub use error::{FlywheelError, Result};
pub use listener::TriggerListener;
pub use schedule::{CronSchedule, Schedule};
pub use storage::{BoxFuture, Storage};
pub use trigger::{Trigger, TriggerInstantSpec, TriggerParameters};
pub use workflow::{ExecutionMode, Workflow, WorkflowConfiguration, WorkflowId};
