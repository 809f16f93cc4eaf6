//! Mock async spawner for testing
//!
//! Provides a mock async spawner that can drop tasks, run them synchronously,
//! or hold them until the test decides to run them.

use super::{AsyncSpawner, JoinHandle};
use futures::future::{join_all, BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;

/// Spawn behavior for MockSpawner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockSpawnBehavior {
    /// Drop tasks immediately (don't execute)
    Drop,
    /// Block on tasks synchronously using a simple executor
    BlockSync,
    /// Queue tasks until [`MockSpawner::run_pending`] is called
    Deferred,
}

/// Mock async spawner for testing
#[derive(Clone)]
pub struct MockSpawner {
    behavior: MockSpawnBehavior,
    deferred: Arc<Mutex<Vec<BoxFuture<'static, ()>>>>,
}

impl std::fmt::Debug for MockSpawner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSpawner")
            .field("behavior", &self.behavior)
            .field("deferred", &self.pending_tasks())
            .finish()
    }
}

impl Default for MockSpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSpawner {
    /// Create a new mock spawner that drops tasks
    pub fn new() -> Self {
        Self::with_behavior(MockSpawnBehavior::Drop)
    }

    /// Create a mock spawner with specific behavior
    pub fn with_behavior(behavior: MockSpawnBehavior) -> Self {
        Self {
            behavior,
            deferred: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock spawner that runs tasks synchronously
    pub fn blocking() -> Self {
        Self::with_behavior(MockSpawnBehavior::BlockSync)
    }

    /// Create a mock spawner that queues tasks
    pub fn deferred() -> Self {
        Self::with_behavior(MockSpawnBehavior::Deferred)
    }

    /// Number of queued tasks that have not run yet
    pub fn pending_tasks(&self) -> usize {
        self.deferred.lock().len()
    }

    /// Run every queued task concurrently to completion, including tasks they spawn
    ///
    /// Returns the number of tasks run.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let tasks = std::mem::take(&mut *self.deferred.lock());
            if tasks.is_empty() {
                return ran;
            }
            ran += tasks.len();
            futures::executor::block_on(join_all(tasks));
        }
    }
}

impl AsyncSpawner for MockSpawner {
    fn spawn<F>(&self, task: F) -> JoinHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self.behavior {
            MockSpawnBehavior::Drop => {
                // Just drop the task
                drop(task);
            }
            MockSpawnBehavior::BlockSync => {
                futures::executor::block_on(task);
            }
            MockSpawnBehavior::Deferred => {
                self.deferred.lock().push(task.boxed());
            }
        }
        JoinHandle::new(())
    }

    fn runtime_name(&self) -> &'static str {
        "Mock"
    }
}
