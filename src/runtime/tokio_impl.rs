//! Tokio async runtime implementation

use super::{AsyncSpawner, JoinHandle};
use std::future::Future;

/// Tokio-based async spawner
///
/// Spawns tasks on the ambient Tokio runtime, or on an explicit handle when
/// the service is driven from outside a runtime.
#[derive(Clone, Debug, Default)]
pub struct TokioSpawner {
    handle: Option<tokio::runtime::Handle>,
}

impl TokioSpawner {
    /// Create a spawner for the runtime current at spawn time
    pub fn new() -> Self {
        Self { handle: None }
    }

    /// Create a spawner bound to a specific runtime
    pub fn with_handle(handle: tokio::runtime::Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }
}

impl AsyncSpawner for TokioSpawner {
    fn spawn<F>(&self, task: F) -> JoinHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = match &self.handle {
            Some(runtime) => runtime.spawn(task),
            None => tokio::spawn(task),
        };
        JoinHandle::new(handle)
    }

    fn runtime_name(&self) -> &'static str {
        "Tokio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_tokio_spawner() {
        let spawner = TokioSpawner::new();
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();

        let handle = spawner.spawn(async move {
            ran_clone.store(true, Ordering::SeqCst);
        });

        let inner = handle.downcast::<tokio::task::JoinHandle<()>>();
        assert!(inner.is_some());
        if let Some(inner) = inner {
            inner.await.unwrap();
        }

        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_tokio_spawner_with_handle() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let spawner = TokioSpawner::with_handle(runtime.handle().clone());

        let handle = spawner.spawn(async {});
        let inner = handle.downcast::<tokio::task::JoinHandle<()>>().unwrap();
        runtime.block_on(inner).unwrap();
    }

    #[test]
    fn test_tokio_runtime_name() {
        let spawner = TokioSpawner::new();
        assert_eq!(spawner.runtime_name(), "Tokio");
    }
}
