// Copyright (c) The Strata Project Authors.

//! Runtime abstraction for background tasks.
//!
//! Stale refreshes and back-population are fire-and-forget; they run on the
//! ambient tokio runtime when one exists.

#[derive(Clone, Debug, Default)]
pub(crate) struct Runtime;

impl Runtime {
    /// Spawns fire-and-forget work on the ambient tokio runtime.
    ///
    /// Returns false when no runtime is available, in which case the work
    /// is dropped. Callers already hold the value they are returning, so a
    /// skipped background task only delays freshness until the next
    /// expired read.
    pub(crate) fn spawn<T>(&self, work: T) -> bool
    where
        T: Future<Output = ()> + Send + 'static,
    {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(work);
                true
            }
            Err(_) => {
                tracing::debug!("no async runtime available, background task skipped");
                false
            }
        }
    }
}
