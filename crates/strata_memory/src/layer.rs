// Copyright (c) The Strata Project Authors.

use async_trait::async_trait;
use moka::future::Cache;
use strata_layer::{CacheEntry, CacheLayer, Clock, Result};

use crate::builder::MemoryLayerBuilder;

/// An in-memory cache layer backed by moka.
///
/// Entries are held in a concurrent map with optional capacity-based
/// eviction (`TinyLFU`). The layer stores entries as-is; expiry filtering
/// happens in the stack. The layer's clock is only consulted by
/// [`cleanup`](CacheLayer::cleanup), which sweeps entries whose expiry has
/// passed.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use strata_layer::{CacheEntry, CacheLayer, Clock};
/// use strata_memory::MemoryLayer;
/// # futures::executor::block_on(async {
///
/// let clock = Clock::frozen();
/// let layer = MemoryLayer::<i32>::new(clock.clone());
///
/// let entry = CacheEntry::new(42, clock.instant() + Duration::from_secs(60));
/// layer.set("key", entry).await?;
/// assert_eq!(*layer.get("key").await?.unwrap().value(), 42);
/// # Ok::<(), strata_layer::LayerError>(())
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct MemoryLayer<V>
where
    V: Clone + Send + Sync + 'static,
{
    inner: Cache<String, CacheEntry<V>>,
    clock: Clock,
}

impl<V> MemoryLayer<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a new unbounded in-memory layer.
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self::builder(clock).build()
    }

    /// Creates a new in-memory layer with a maximum capacity.
    ///
    /// Once the capacity is reached, entries are evicted using the
    /// `TinyLFU` policy.
    #[must_use]
    pub fn with_capacity(clock: Clock, max_capacity: u64) -> Self {
        Self::builder(clock).max_capacity(max_capacity).build()
    }

    /// Creates a new builder for configuring an in-memory layer.
    #[must_use]
    pub fn builder(clock: Clock) -> MemoryLayerBuilder<V> {
        MemoryLayerBuilder::new(clock)
    }

    /// Returns the number of entries currently held.
    ///
    /// The count is an estimate until pending eviction work has run.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    pub(crate) fn from_builder(builder: &MemoryLayerBuilder<V>) -> Self {
        let mut moka_builder = Cache::builder();

        if let Some(capacity) = builder.max_capacity {
            moka_builder = moka_builder.max_capacity(capacity);
        }

        if let Some(capacity) = builder.initial_capacity {
            moka_builder = moka_builder.initial_capacity(capacity);
        }

        if let Some(name) = builder.name.as_deref() {
            moka_builder = moka_builder.name(name);
        }

        Self {
            inner: moka_builder.build(),
            clock: builder.clock.clone(),
        }
    }
}

#[async_trait]
impl<V> CacheLayer<V> for MemoryLayer<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<CacheEntry<V>>> {
        Ok(self.inner.get(key).await)
    }

    async fn set(&self, key: &str, entry: CacheEntry<V>) -> Result<()> {
        self.inner.insert(key.to_owned(), entry).await;
        Ok(())
    }

    async fn evict(&self, key: &str) -> Result<()> {
        self.inner.invalidate(key).await;
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.inner.invalidate_all();
        Ok(())
    }

    async fn cleanup(&self) -> Result<()> {
        // Flush moka's write buffers so the iterator sees recent inserts.
        self.inner.run_pending_tasks().await;

        let now = self.clock.instant();
        let expired: Vec<_> = self
            .inner
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key)
            .collect();

        for key in expired {
            self.inner.invalidate(key.as_ref()).await;
        }
        self.inner.run_pending_tasks().await;
        Ok(())
    }
}
