use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use flywheel_core::backend::{Backend, BackendFactory, RouteKeyFn, RunSpec, RunState};
use flywheel_core::error::{FlywheelError, Result};

/// Routes execution-lifecycle calls to backends keyed by run context.
///
/// Backends are created lazily, exactly once per distinct key even under
/// concurrent callers, and retained until shutdown; the key set only grows
/// over the router's lifetime. The router owns every backend it creates and
/// is the only party that releases their resources.
pub struct ExecutionRouter {
    factory: BackendFactory,
    route_key: RouteKeyFn,
    backends: RwLock<HashMap<String, Arc<dyn Backend>>>,
}

impl ExecutionRouter {
    /// Create a router from a backend factory and a pure key derivation.
    pub fn new(factory: BackendFactory, route_key: RouteKeyFn) -> Self {
        Self {
            factory,
            route_key,
            backends: RwLock::new(HashMap::new()),
        }
    }

    /// Launch an execution on the backend resolved from the run context.
    ///
    /// Backend errors propagate verbatim; the router adds no retry.
    pub async fn start(&self, state: &RunState, spec: &RunSpec) -> Result<String> {
        self.backend(state).await?.start(state, spec).await
    }

    /// Poll an execution on the backend resolved from the run context.
    pub async fn poll(&self, state: &RunState) -> Result<()> {
        self.backend(state).await?.poll(state).await
    }

    /// Ask every registered backend to release transient resources.
    ///
    /// Known limitation: the first failure aborts cleanup of the remaining
    /// backends in this call, unlike `shutdown` which attempts all.
    pub async fn cleanup(&self) -> Result<()> {
        for (key, backend) in self.snapshot().await {
            tracing::debug!(backend = %key, "Cleaning up backend");
            backend.cleanup().await?;
        }
        Ok(())
    }

    /// Release every registered backend's persistent resources.
    ///
    /// Every backend's close is attempted even if earlier ones fail. With
    /// multiple failures the first is reported as primary and the rest are
    /// retained as secondary errors.
    pub async fn shutdown(&self) -> Result<()> {
        let mut failures = Vec::new();

        for (key, backend) in self.snapshot().await {
            if let Err(e) = backend.close().await {
                tracing::warn!(backend = %key, error = %e, "Failed to close backend");
                failures.push(e);
            }
        }

        if failures.is_empty() {
            return Ok(());
        }
        let primary = failures.remove(0);
        Err(FlywheelError::BackendShutdown {
            primary: Box::new(primary),
            secondary: failures,
        })
    }

    /// Number of backends created so far.
    pub async fn backend_count(&self) -> usize {
        self.backends.read().await.len()
    }

    /// Resolve the backend for a run, creating it on first reference.
    async fn backend(&self, state: &RunState) -> Result<Arc<dyn Backend>> {
        let key = (self.route_key)(state);

        if let Some(backend) = self.backends.read().await.get(&key) {
            return Ok(Arc::clone(backend));
        }

        // Re-check under the write lock so racing first references agree on
        // a single factory invocation per key.
        let mut backends = self.backends.write().await;
        if let Some(backend) = backends.get(&key) {
            return Ok(Arc::clone(backend));
        }

        tracing::info!(backend = %key, "Creating execution backend");
        let backend = (self.factory)(&key)?;
        backends.insert(key, Arc::clone(&backend));
        Ok(backend)
    }

    async fn snapshot(&self) -> Vec<(String, Arc<dyn Backend>)> {
        self.backends
            .read()
            .await
            .iter()
            .map(|(k, b)| (k.clone(), Arc::clone(b)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;
    use flywheel_core::testing::CountingBackendFactory;
    use flywheel_core::workflow::WorkflowId;

    fn run_state(component: &str, workflow: &str) -> RunState {
        RunState::new(WorkflowId::new(component, workflow), Utc::now())
    }

    /// Routes on the run's component id.
    fn component_key() -> RouteKeyFn {
        Arc::new(|state: &RunState| state.workflow_id.component_id.clone())
    }

    fn router(factory: &Arc<CountingBackendFactory>) -> ExecutionRouter {
        ExecutionRouter::new(factory.as_factory(), component_key())
    }

    #[tokio::test]
    async fn test_equal_keys_share_one_backend() {
        let factory = CountingBackendFactory::new();
        let router = router(&factory);
        let spec = RunSpec::new("exec-1", "busybox:1.36");

        router
            .start(&run_state("comp-a", "wf-1"), &spec)
            .await
            .unwrap();
        router
            .start(&run_state("comp-a", "wf-2"), &spec)
            .await
            .unwrap();
        assert_eq!(factory.created_count(), 1);

        router
            .start(&run_state("comp-b", "wf-1"), &spec)
            .await
            .unwrap();
        assert_eq!(factory.created_count(), 2);
        assert_eq!(factory.created_keys(), vec!["comp-a", "comp-b"]);
        assert_eq!(factory.backend("comp-a").unwrap().start_count(), 2);
        assert_eq!(factory.backend("comp-b").unwrap().start_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_references_create_once() {
        let factory = CountingBackendFactory::new();
        let router = Arc::new(router(&factory));

        let mut handles = Vec::new();
        for i in 0..16 {
            let router = router.clone();
            handles.push(tokio::spawn(async move {
                let spec = RunSpec::new(format!("exec-{}", i), "busybox:1.36");
                router.start(&run_state("comp-a", "wf-1"), &spec).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(factory.created_count(), 1);
        assert_eq!(factory.backend("comp-a").unwrap().start_count(), 16);
    }

    #[tokio::test]
    async fn test_poll_routes_to_same_backend() {
        let factory = CountingBackendFactory::new();
        let router = router(&factory);
        let state = run_state("comp-a", "wf-1");

        router
            .start(&state, &RunSpec::new("exec-1", "busybox:1.36"))
            .await
            .unwrap();
        router.poll(&state).await.unwrap();

        assert_eq!(factory.created_count(), 1);
        assert_eq!(factory.backend("comp-a").unwrap().poll_count(), 1);
    }

    #[tokio::test]
    async fn test_start_error_propagates_verbatim() {
        let factory = CountingBackendFactory::new();
        let router = router(&factory);
        let state = run_state("comp-a", "wf-1");
        let spec = RunSpec::new("exec-1", "busybox:1.36");

        router.start(&state, &spec).await.unwrap();
        factory.backend("comp-a").unwrap().fail_start(true);

        let err = router.start(&state, &spec).await.unwrap_err();
        assert!(matches!(err, FlywheelError::Backend(_)));
    }

    #[tokio::test]
    async fn test_factory_error_propagates_and_creation_retries() {
        let factory = CountingBackendFactory::new();
        factory.fail_key("comp-a");
        let router = router(&factory);
        let state = run_state("comp-a", "wf-1");
        let spec = RunSpec::new("exec-1", "busybox:1.36");

        assert!(router.start(&state, &spec).await.is_err());
        assert_eq!(router.backend_count().await, 0);

        // A failed creation leaves no registry entry, so a later call gets
        // a fresh factory attempt.
        factory.unfail_key("comp-a");
        router.start(&state, &spec).await.unwrap();
        assert_eq!(factory.created_count(), 2);
        assert_eq!(router.backend_count().await, 1);
    }

    #[tokio::test]
    async fn test_shutdown_attempts_all_and_aggregates() {
        let factory = CountingBackendFactory::new();
        let router = router(&factory);
        let spec = RunSpec::new("exec-1", "busybox:1.36");

        for component in ["comp-a", "comp-b", "comp-c"] {
            router
                .start(&run_state(component, "wf-1"), &spec)
                .await
                .unwrap();
        }
        factory.backend("comp-b").unwrap().fail_close(true);

        let err = router.shutdown().await.unwrap_err();
        let FlywheelError::BackendShutdown { primary, secondary } = err else {
            panic!("expected aggregated shutdown error, got {err}");
        };
        assert!(matches!(*primary, FlywheelError::Backend(_)));
        assert!(secondary.is_empty());

        for component in ["comp-a", "comp-b", "comp-c"] {
            assert_eq!(factory.backend(component).unwrap().close_count(), 1);
        }
    }

    #[tokio::test]
    async fn test_shutdown_retains_secondary_failures() {
        let factory = CountingBackendFactory::new();
        let router = router(&factory);
        let spec = RunSpec::new("exec-1", "busybox:1.36");

        for component in ["comp-a", "comp-b", "comp-c"] {
            router
                .start(&run_state(component, "wf-1"), &spec)
                .await
                .unwrap();
            factory.backend(component).unwrap().fail_close(true);
        }

        let err = router.shutdown().await.unwrap_err();
        let FlywheelError::BackendShutdown { secondary, .. } = err else {
            panic!("expected aggregated shutdown error, got {err}");
        };
        assert_eq!(secondary.len(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_with_no_failures_is_ok() {
        let factory = CountingBackendFactory::new();
        let router = router(&factory);

        router
            .start(
                &run_state("comp-a", "wf-1"),
                &RunSpec::new("exec-1", "busybox:1.36"),
            )
            .await
            .unwrap();

        router.shutdown().await.unwrap();
        assert_eq!(factory.backend("comp-a").unwrap().close_count(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_stops_at_first_failure() {
        let factory = CountingBackendFactory::new();
        let router = router(&factory);
        let spec = RunSpec::new("exec-1", "busybox:1.36");

        for component in ["comp-a", "comp-b", "comp-c"] {
            router
                .start(&run_state(component, "wf-1"), &spec)
                .await
                .unwrap();
            factory.backend(component).unwrap().fail_cleanup(true);
        }

        assert!(router.cleanup().await.is_err());

        // Only the first backend's cleanup was attempted.
        let attempted: usize = ["comp-a", "comp-b", "comp-c"]
            .iter()
            .map(|c| factory.backend(c).unwrap().cleanup_count())
            .sum();
        assert_eq!(attempted, 1);
    }
}
