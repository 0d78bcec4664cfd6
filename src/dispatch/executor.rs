//! Per-item executor seam
//!
//! The dispatcher knows nothing about what an item does. It hands each
//! payload to an [`ItemExecutor`] and awaits exactly one outcome.

use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

/// Runs one payload of a batch to completion
pub trait ItemExecutor<P>: Send + Sync + 'static {
    type Output: Send + 'static;

    /// Execute a single payload. Called at most once per payload.
    fn execute(&self, payload: P) -> BoxFuture<'static, anyhow::Result<Self::Output>>;
}

impl<P, F, Fut, T> ItemExecutor<P> for F
where
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    T: Send + 'static,
{
    type Output = T;

    fn execute(&self, payload: P) -> BoxFuture<'static, anyhow::Result<T>> {
        Box::pin(self(payload))
    }
}

/// Shared executor handle, so one executor can back several dispatchers
pub struct SharedExecutor<E>(pub Arc<E>);

impl<E> Clone for SharedExecutor<E> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<P, E> ItemExecutor<P> for SharedExecutor<E>
where
    E: ItemExecutor<P>,
{
    type Output = E::Output;

    fn execute(&self, payload: P) -> BoxFuture<'static, anyhow::Result<E::Output>> {
        self.0.execute(payload)
    }
}
