// Copyright (c) The Strata Project Authors.

//! Extension pipeline around cache refreshes and lifecycle events.
//!
//! Extensions intercept the stack at two seams:
//!
//! - [`CacheExtension::with_refresh`] wraps the act of producing a new
//!   entry (invoke factory, write layers, notify listeners). Wrappers can
//!   add distributed locking, metrics, timeouts, or absorb failures.
//! - Listener hooks ([`on_update`](CacheExtension::on_update),
//!   [`on_eviction`](CacheExtension::on_eviction),
//!   [`on_flush`](CacheExtension::on_flush)) fire after the corresponding
//!   stack-wide operation completes.
//!
//! With several extensions registered, refresh wrappers nest in
//! registration order (the first registered extension is outermost) and
//! listeners fan out in registration order.

use std::{fmt::Debug, sync::Arc, time::Instant};

use async_trait::async_trait;
use futures::future::BoxFuture;
use strata_layer::{CacheEntry, CacheSettings};

use crate::{CacheStack, Error};

mod logging;

pub use logging::LoggingExtension;

/// Classifies a stack-wide write for update listeners.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheUpdateType {
    /// The write created an entry where a true miss was observed.
    AddEntry,
    /// The write replaced or refreshed a previously observed entry.
    AddOrUpdateEntry,
}

/// The rest of the refresh pipeline, handed to refresh wrappers.
///
/// A wrapper runs the continuation exactly once via [`run`](Self::run),
/// usually surrounded by its own before/after logic. Dropping it without
/// running aborts the refresh; the stack then reports the wrapper's return
/// value to every caller.
pub struct RefreshNext<V> {
    inner: BoxFuture<'static, Result<CacheEntry<V>, Error>>,
}

impl<V> RefreshNext<V> {
    pub(crate) fn new(inner: BoxFuture<'static, Result<CacheEntry<V>, Error>>) -> Self {
        Self { inner }
    }

    /// Runs the wrapped refresh and returns the produced entry.
    pub async fn run(self) -> Result<CacheEntry<V>, Error> {
        self.inner.await
    }
}

impl<V> Debug for RefreshNext<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshNext").finish()
    }
}

/// Pluggable interceptor around refreshes and lifecycle events.
///
/// All hooks default to pass-through no-ops, so an extension only
/// implements the seams it cares about. An extension instance belongs to
/// exactly one stack; it is notified of its owner once, at build time,
/// through [`attached`](Self::attached).
#[async_trait]
pub trait CacheExtension<V>: Send + Sync
where
    V: 'static,
{
    /// Called once when the owning stack is built.
    ///
    /// Extensions must not be shared across stacks.
    fn attached(&self, stack: &CacheStack<V>) {
        let _ = stack;
    }

    /// Wraps a refresh for `key`.
    ///
    /// The default implementation runs the pipeline unchanged. A wrapper
    /// that returns without calling [`RefreshNext::run`] replaces the
    /// refresh outcome entirely, including what waiting callers observe.
    async fn with_refresh(&self, key: &str, next: RefreshNext<V>, settings: &CacheSettings) -> Result<CacheEntry<V>, Error> {
        let _ = (key, settings);
        next.run().await
    }

    /// Fires after a successful stack-wide write.
    async fn on_update(&self, key: &str, expiry: Instant, update: CacheUpdateType) -> Result<(), Error> {
        let _ = (key, expiry, update);
        Ok(())
    }

    /// Fires after an eviction completes on every layer.
    async fn on_eviction(&self, key: &str) -> Result<(), Error> {
        let _ = key;
        Ok(())
    }

    /// Fires after a flush completes on every layer.
    async fn on_flush(&self) -> Result<(), Error> {
        Ok(())
    }

    /// Releases resources held by the extension at stack teardown.
    async fn close(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// Composes zero or more extensions into a single pipeline.
pub(crate) struct ExtensionContainer<V> {
    extensions: Vec<Arc<dyn CacheExtension<V>>>,
}

impl<V> ExtensionContainer<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(extensions: Vec<Arc<dyn CacheExtension<V>>>) -> Self {
        Self { extensions }
    }

    pub(crate) fn extensions(&self) -> &[Arc<dyn CacheExtension<V>>] {
        &self.extensions
    }

    /// Runs `inner` through every registered refresh wrapper.
    ///
    /// With zero extensions this degenerates to awaiting `inner` directly.
    pub(crate) async fn with_refresh(
        &self,
        key: &str,
        settings: &CacheSettings,
        inner: BoxFuture<'static, Result<CacheEntry<V>, Error>>,
    ) -> Result<CacheEntry<V>, Error> {
        let mut next = inner;
        // Wrap back-to-front so the first registered extension runs outermost.
        for extension in self.extensions.iter().rev() {
            let extension = Arc::clone(extension);
            let key = key.to_owned();
            let settings = settings.clone();
            next = Box::pin(async move { extension.with_refresh(&key, RefreshNext::new(next), &settings).await });
        }
        next.await
    }

    pub(crate) async fn on_update(&self, key: &str, expiry: Instant, update: CacheUpdateType) -> Result<(), Error> {
        // Every listener is notified even when an earlier one fails, the
        // same way the key lock delivers to every waiter; the first
        // failure still propagates to the caller.
        let mut first_error = None;
        for extension in &self.extensions {
            if let Err(error) = extension.on_update(key, expiry, update).await {
                tracing::warn!(key, %error, "update listener failed");
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub(crate) async fn on_eviction(&self, key: &str) -> Result<(), Error> {
        let mut first_error = None;
        for extension in &self.extensions {
            if let Err(error) = extension.on_eviction(key).await {
                tracing::warn!(key, %error, "eviction listener failed");
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub(crate) async fn on_flush(&self) -> Result<(), Error> {
        let mut first_error = None;
        for extension in &self.extensions {
            if let Err(error) = extension.on_flush().await {
                tracing::warn!(%error, "flush listener failed");
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub(crate) async fn close(&self) -> Result<(), Error> {
        for extension in &self.extensions {
            extension.close().await?;
        }
        Ok(())
    }
}

impl<V> Debug for ExtensionContainer<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionContainer")
            .field("extensions", &self.extensions.len())
            .finish()
    }
}
