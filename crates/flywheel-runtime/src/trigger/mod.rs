mod manager;

pub use manager::{Time, TriggerManager, TriggerManagerConfig};
