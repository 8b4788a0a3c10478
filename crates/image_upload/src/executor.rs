use std::rc::Rc;

use futures::future::LocalBoxFuture;
use futures::task::LocalSpawnExt;

pub use futures::task::SpawnError;

/// Schedules upload continuations on the UI thread's event loop.
pub trait LocalExecutor {
    /// Queues `task` without polling it. Fails when the loop has shut down.
    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>) -> Result<(), SpawnError>;
}

impl<E: LocalExecutor + ?Sized> LocalExecutor for Rc<E> {
    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>) -> Result<(), SpawnError> {
        (**self).spawn_local(task)
    }
}

impl LocalExecutor for futures::executor::LocalSpawner {
    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>) -> Result<(), SpawnError> {
        LocalSpawnExt::spawn_local(self, task)
    }
}

/// Spawns onto the current `tokio::task::LocalSet`. Must be used from
/// inside one.
#[cfg(feature = "tokio")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioLocalExecutor;

#[cfg(feature = "tokio")]
impl LocalExecutor for TokioLocalExecutor {
    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>) -> Result<(), SpawnError> {
        drop(tokio::task::spawn_local(task));
        Ok(())
    }
}
