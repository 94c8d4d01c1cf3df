use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::backend::{Backend, BackendFactory, RunSpec, RunState};
use crate::error::{FlywheelError, Result};
use crate::storage::BoxFuture;

/// In-memory [`Backend`] recording every lifecycle call.
#[derive(Default)]
pub struct MemBackend {
    starts: Mutex<Vec<(RunState, RunSpec)>>,
    polls: Mutex<Vec<RunState>>,
    cleanups: AtomicUsize,
    closes: AtomicUsize,
    fail_start: AtomicBool,
    fail_cleanup: AtomicBool,
    fail_close: AtomicBool,
}

impl MemBackend {
    pub fn start_count(&self) -> usize {
        self.starts.lock().unwrap().len()
    }

    pub fn starts(&self) -> Vec<(RunState, RunSpec)> {
        self.starts.lock().unwrap().clone()
    }

    pub fn poll_count(&self) -> usize {
        self.polls.lock().unwrap().len()
    }

    pub fn cleanup_count(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub fn fail_cleanup(&self, fail: bool) {
        self.fail_cleanup.store(fail, Ordering::SeqCst);
    }

    pub fn fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }
}

impl Backend for MemBackend {
    fn start<'a>(
        &'a self,
        state: &'a RunState,
        spec: &'a RunSpec,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            self.starts.lock().unwrap().push((state.clone(), spec.clone()));
            if self.fail_start.load(Ordering::SeqCst) {
                return Err(FlywheelError::Backend("start failed".into()));
            }
            Ok(spec.execution_id.clone())
        })
    }

    fn poll<'a>(&'a self, state: &'a RunState) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.polls.lock().unwrap().push(state.clone());
            Ok(())
        })
    }

    fn cleanup(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
            if self.fail_cleanup.load(Ordering::SeqCst) {
                return Err(FlywheelError::Backend("cleanup failed".into()));
            }
            Ok(())
        })
    }

    fn close(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail_close.load(Ordering::SeqCst) {
                return Err(FlywheelError::Backend("close failed".into()));
            }
            Ok(())
        })
    }
}

/// A [`BackendFactory`] that counts invocations per key and hands out
/// [`MemBackend`]s that stay reachable for assertions.
#[derive(Default)]
pub struct CountingBackendFactory {
    created: Mutex<Vec<String>>,
    backends: Mutex<HashMap<String, Arc<MemBackend>>>,
    failing_keys: Mutex<Vec<String>>,
}

impl CountingBackendFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The factory closure to hand to a router.
    pub fn as_factory(self: &Arc<Self>) -> BackendFactory {
        let this = Arc::clone(self);
        Arc::new(move |key: &str| this.create(key))
    }

    fn create(&self, key: &str) -> Result<Arc<dyn Backend>> {
        self.created.lock().unwrap().push(key.to_string());
        if self.failing_keys.lock().unwrap().iter().any(|k| k == key) {
            return Err(FlywheelError::Backend(format!(
                "no backend available for '{}'",
                key
            )));
        }
        let backend = Arc::new(MemBackend::default());
        self.backends
            .lock()
            .unwrap()
            .insert(key.to_string(), Arc::clone(&backend));
        Ok(backend)
    }

    /// Make creation fail for a key.
    pub fn fail_key(&self, key: impl Into<String>) {
        self.failing_keys.lock().unwrap().push(key.into());
    }

    /// Stop failing creation for a key.
    pub fn unfail_key(&self, key: &str) {
        self.failing_keys.lock().unwrap().retain(|k| k != key);
    }

    /// Keys passed to the factory, in invocation order.
    pub fn created_keys(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }

    /// Total number of factory invocations.
    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    /// The backend created for a key, if any.
    pub fn backend(&self, key: &str) -> Option<Arc<MemBackend>> {
        self.backends.lock().unwrap().get(key).cloned()
    }
}
