// Copyright (c) The Strata Project Authors.

//! Structured logging extension.

use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Instant,
};

use async_trait::async_trait;
use strata_layer::{CacheEntry, CacheSettings};

use super::{CacheExtension, CacheUpdateType, RefreshNext};
use crate::{CacheStack, Error};

/// Emits structured `tracing` events for refreshes and lifecycle hooks.
///
/// Refresh wrapping records wall-clock duration and outcome; update,
/// eviction and flush listeners emit debug events. The extension never
/// alters results flowing through the pipeline.
///
/// # Examples
///
/// ```
/// use strata::{CacheStack, Clock, LoggingExtension, MemoryLayer};
///
/// let clock = Clock::frozen();
/// let stack = CacheStack::<i32>::builder(clock.clone())
///     .layer(MemoryLayer::new(clock))
///     .extension(LoggingExtension::new())
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Default)]
pub struct LoggingExtension {
    attached: AtomicBool,
}

impl LoggingExtension {
    /// Creates a new logging extension.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl<V> CacheExtension<V> for LoggingExtension
where
    V: Clone + Send + Sync + 'static,
{
    fn attached(&self, stack: &CacheStack<V>) {
        let _ = stack;
        let previously = self.attached.swap(true, Ordering::Relaxed);
        debug_assert!(!previously, "extension must not be shared across stacks");
    }

    async fn with_refresh(&self, key: &str, next: RefreshNext<V>, settings: &CacheSettings) -> Result<CacheEntry<V>, Error> {
        let started = Instant::now();
        let result = next.run().await;
        let elapsed = started.elapsed();
        match &result {
            Ok(_) => {
                tracing::info!(key, ?elapsed, ttl = ?settings.time_to_live(), "cache refresh completed");
            }
            Err(error) => {
                tracing::warn!(key, ?elapsed, %error, "cache refresh failed");
            }
        }
        result
    }

    async fn on_update(&self, key: &str, expiry: Instant, update: CacheUpdateType) -> Result<(), Error> {
        tracing::debug!(key, ?update, ?expiry, "cache entry written");
        Ok(())
    }

    async fn on_eviction(&self, key: &str) -> Result<(), Error> {
        tracing::debug!(key, "cache entry evicted");
        Ok(())
    }

    async fn on_flush(&self) -> Result<(), Error> {
        tracing::debug!("cache flushed");
        Ok(())
    }
}
