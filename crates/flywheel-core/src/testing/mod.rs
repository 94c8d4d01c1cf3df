//! In-memory test doubles for the scheduler's external collaborators.
//!
//! These are recording fakes, not mocks with expectations: they capture every
//! call and let tests script failures (generic, idempotent-conflict, or
//! blocking) so scheduler and router behavior can be asserted without a real
//! persistence engine or execution backend.

mod backend;
mod listener;
mod storage;

pub use backend::{CountingBackendFactory, MemBackend};
pub use listener::{ListenerBehavior, RecordedTrigger, RecordingListener};
pub use storage::MemStorage;
