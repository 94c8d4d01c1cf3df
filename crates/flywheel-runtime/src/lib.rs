pub mod exec;
pub mod trigger;

pub use exec::ExecutionRouter;
pub use trigger::{Time, TriggerManager, TriggerManagerConfig};
