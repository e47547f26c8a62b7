// Copyright (c) The Strata Project Authors.

//! The cache stack: layered reads, write-through, back-population and
//! coordinated refresh.

use std::{
    fmt::Debug,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use futures::future::BoxFuture;
use strata_layer::{CacheEntry, CacheLayer, CacheSettings, Clock, DynamicLayer};

use crate::{
    BoxError, Error,
    builder::CacheStackBuilder,
    extensions::{CacheExtension, CacheUpdateType, ExtensionContainer},
    keylock::{Acquire, KeyLockTable, RefreshResult},
    runtime::Runtime,
};

/// Classification of a probed entry against the current time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheEntryStatus {
    /// A fresh entry was found; it is served as-is.
    Hit,
    /// An unexpired entry past its stale date was found; it is served
    /// while a background refresh is scheduled.
    Stale,
    /// An entry past its expiry was found; a blocking refresh replaces it.
    Expired,
    /// No entry was found; a blocking refresh produces one.
    Miss,
}

enum Classified<V> {
    Miss,
    Expired(CacheEntry<V>),
    Stale(CacheEntry<V>),
    Fresh { index: usize, entry: CacheEntry<V> },
}

/// A multi-layer cache with a coordinated get-or-compute protocol.
///
/// The stack fronts an ordered list of [`CacheLayer`]s, fastest first.
/// Reads probe layers top-to-bottom; writes go through every layer
/// top-to-bottom. [`get_or_set`](Self::get_or_set) adds the coordination
/// the layers themselves do not provide:
///
/// - misses and expired entries are refreshed through a per-key
///   single-flight gate, so concurrent callers share one factory run,
/// - entries past their stale date are served immediately while a
///   background refresh runs,
/// - hits found below the top layer are copied back up in the background.
///
/// The stack is cheap to clone; clones share all state.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use strata::{CacheSettings, CacheStack, Clock, MemoryLayer};
///
/// # futures::executor::block_on(async {
/// let clock = Clock::frozen();
/// let stack = CacheStack::builder(clock.clone())
///     .layer(MemoryLayer::new(clock))
///     .build()?;
///
/// let settings = CacheSettings::new(Duration::from_secs(300));
/// let value = stack
///     .get_or_set("user:42", |_previous| async { Ok(7) }, &settings)
///     .await?;
/// assert_eq!(value, 7);
/// # Ok::<(), strata::Error>(())
/// # }).unwrap();
/// ```
pub struct CacheStack<V> {
    inner: Arc<StackInner<V>>,
}

struct StackInner<V> {
    layers: Vec<DynamicLayer<V>>,
    extensions: ExtensionContainer<V>,
    clock: Clock,
    key_lock: KeyLockTable<V>,
    runtime: Runtime,
    disposed: AtomicBool,
}

impl<V> Clone for CacheStack<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Debug for CacheStack<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStack")
            .field("layers", &self.inner.layers.len())
            .field("disposed", &self.inner.disposed.load(Ordering::Relaxed))
            .finish()
    }
}

impl<V> CacheStack<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a new cache stack builder.
    ///
    /// Layers are added fastest-first; at least one is required.
    #[must_use]
    pub fn builder(clock: Clock) -> CacheStackBuilder<V> {
        CacheStackBuilder::new(clock)
    }

    pub(crate) fn new(layers: Vec<DynamicLayer<V>>, extensions: Vec<Arc<dyn CacheExtension<V>>>, clock: Clock) -> Self {
        Self {
            inner: Arc::new(StackInner {
                layers,
                extensions: ExtensionContainer::new(extensions),
                clock,
                key_lock: KeyLockTable::new(),
                runtime: Runtime::default(),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the stack's clock.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.inner.clock
    }

    /// Returns the ordered layer list, highest priority first.
    #[must_use]
    pub fn layers(&self) -> &[DynamicLayer<V>] {
        &self.inner.layers
    }

    /// Returns the registered extensions in registration order.
    #[must_use]
    pub fn extensions(&self) -> &[Arc<dyn CacheExtension<V>>] {
        self.inner.extensions.extensions()
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.inner.disposed.load(Ordering::Acquire) {
            return Err(Error::Disposed);
        }
        Ok(())
    }

    fn ensure_key(key: &str) -> Result<(), Error> {
        if key.is_empty() {
            return Err(Error::InvalidArgument("key must not be empty"));
        }
        Ok(())
    }

    /// Returns the first entry found for `key`, walking layers
    /// top-to-bottom.
    ///
    /// This is a raw read: unavailable and failing layers are skipped, and
    /// the returned entry is not filtered by expiry. Freshness policy
    /// lives in [`get_or_set`](Self::get_or_set).
    pub async fn get(&self, key: &str) -> Result<Option<CacheEntry<V>>, Error> {
        Ok(self.get_with_layer(key).await?.map(|(_, entry)| entry))
    }

    /// Like [`get`](Self::get), but also reports which layer served the
    /// entry.
    pub async fn get_with_layer(&self, key: &str) -> Result<Option<(usize, CacheEntry<V>)>, Error> {
        self.ensure_open()?;
        Self::ensure_key(key)?;
        Ok(self.probe(key).await)
    }

    /// Walks layers top-to-bottom and returns the first available hit.
    ///
    /// A layer that reports unavailable or fails its read falls through to
    /// the next layer; a faulting top layer must not masquerade as a miss,
    /// which would stampede refreshes during an outage.
    async fn probe(&self, key: &str) -> Option<(usize, CacheEntry<V>)> {
        for (index, layer) in self.inner.layers.iter().enumerate() {
            if !layer.is_available(key).await {
                tracing::trace!(key, index, "layer unavailable, falling through");
                continue;
            }
            match layer.get(key).await {
                Ok(Some(entry)) => return Some((index, entry)),
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(key, index, %error, "layer read failed, treating as unavailable");
                }
            }
        }
        None
    }

    /// Writes `value` to every layer with the given time-to-live and
    /// returns the created entry.
    ///
    /// The write is authoritative: it does not take the key lock, so it
    /// may interleave with an in-flight refresh, last writer winning per
    /// layer.
    pub async fn set(&self, key: &str, value: V, time_to_live: Duration) -> Result<CacheEntry<V>, Error> {
        let entry = CacheEntry::new(value, self.inner.clock.instant() + time_to_live);
        self.set_entry(key, entry.clone()).await?;
        Ok(entry)
    }

    /// Writes a caller-built entry to every layer top-to-bottom.
    ///
    /// Fires the update listeners once the write has reached every layer.
    /// The first failing layer aborts the walk and its error propagates;
    /// already-written layers are not rolled back.
    pub async fn set_entry(&self, key: &str, entry: CacheEntry<V>) -> Result<(), Error> {
        self.ensure_open()?;
        Self::ensure_key(key)?;
        let expiry = entry.expiry();
        self.write_through(key, entry).await?;
        self.inner
            .extensions
            .on_update(key, expiry, CacheUpdateType::AddOrUpdateEntry)
            .await
    }

    async fn write_through(&self, key: &str, entry: CacheEntry<V>) -> Result<(), Error> {
        for (index, layer) in self.inner.layers.iter().enumerate() {
            layer
                .set(key, entry.clone())
                .await
                .map_err(|source| Error::layer(index, "set", source))?;
        }
        Ok(())
    }

    /// Removes `key` from every layer, then fires the eviction listeners.
    pub async fn evict(&self, key: &str) -> Result<(), Error> {
        self.ensure_open()?;
        Self::ensure_key(key)?;
        for (index, layer) in self.inner.layers.iter().enumerate() {
            layer
                .evict(key)
                .await
                .map_err(|source| Error::layer(index, "evict", source))?;
        }
        self.inner.extensions.on_eviction(key).await
    }

    /// Empties every layer, then fires the flush listeners.
    pub async fn flush(&self) -> Result<(), Error> {
        self.ensure_open()?;
        for (index, layer) in self.inner.layers.iter().enumerate() {
            layer
                .flush()
                .await
                .map_err(|source| Error::layer(index, "flush", source))?;
        }
        self.inner.extensions.on_flush().await
    }

    /// Asks every layer to drop expired entries.
    pub async fn cleanup(&self) -> Result<(), Error> {
        self.ensure_open()?;
        for (index, layer) in self.inner.layers.iter().enumerate() {
            layer
                .cleanup()
                .await
                .map_err(|source| Error::layer(index, "cleanup", source))?;
        }
        Ok(())
    }

    /// Tears the stack down: closes every layer in order, then the
    /// extensions.
    ///
    /// A successful teardown is idempotent; every other operation fails
    /// with [`Error::Disposed`] afterwards. When a layer or extension
    /// fails to close, the error propagates and the stack stays open so
    /// the caller can retry the teardown.
    pub async fn close(&self) -> Result<(), Error> {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let result = self.teardown().await;
        if result.is_err() {
            // Reopen rather than masking the incomplete teardown behind
            // an Ok on the next call.
            self.inner.disposed.store(false, Ordering::Release);
        }
        result
    }

    async fn teardown(&self) -> Result<(), Error> {
        for (index, layer) in self.inner.layers.iter().enumerate() {
            layer
                .close()
                .await
                .map_err(|source| Error::layer(index, "close", source))?;
        }
        self.inner.extensions.close().await
    }

    /// Returns the cached value for `key`, computing it when needed.
    ///
    /// The probed entry decides what happens:
    ///
    /// - fresh top-layer hit: returned immediately,
    /// - fresh hit in a lower layer: returned immediately, copied into the
    ///   higher layers in the background,
    /// - stale (past `stale_after`, not expired): returned immediately, a
    ///   background refresh replaces it,
    /// - expired or missing: the caller refreshes through the per-key
    ///   single-flight gate. Concurrent callers for the same key share one
    ///   factory run and observe the same outcome, value or error.
    ///
    /// The factory receives the previous value when one was found, and
    /// its entry is written to every layer with
    /// `settings.time_to_live()` before callers observe it.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use strata::{CacheSettings, CacheStack, Clock, MemoryLayer};
    ///
    /// # futures::executor::block_on(async {
    /// let clock = Clock::frozen();
    /// let stack = CacheStack::builder(clock.clone())
    ///     .layer(MemoryLayer::new(clock))
    ///     .build()?;
    /// let settings = CacheSettings::new(Duration::from_secs(60));
    ///
    /// let value = stack.get_or_set("a", |_| async { Ok(42) }, &settings).await?;
    /// assert_eq!(value, 42);
    ///
    /// // Cached now; the second factory never runs.
    /// let value = stack.get_or_set("a", |_| async { Ok(99) }, &settings).await?;
    /// assert_eq!(value, 42);
    /// # Ok::<(), strata::Error>(())
    /// # }).unwrap();
    /// ```
    pub async fn get_or_set<F, Fut>(&self, key: &str, factory: F, settings: &CacheSettings) -> Result<V, Error>
    where
        F: FnOnce(Option<V>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, BoxError>> + Send + 'static,
    {
        self.ensure_open()?;
        Self::ensure_key(key)?;
        Self::validate_settings(settings)?;

        let now = self.inner.clock.instant();
        match self.classify(key, settings, now).await {
            Classified::Miss => {
                let entry = self.refresh(key, None, factory, settings, CacheEntryStatus::Miss, now).await?;
                Ok(entry.into_value())
            }
            Classified::Expired(previous) => {
                let entry = self
                    .refresh(key, Some(previous), factory, settings, CacheEntryStatus::Expired, now)
                    .await?;
                Ok(entry.into_value())
            }
            Classified::Stale(entry) => {
                let value = entry.value().clone();
                self.spawn_stale_refresh(key, entry, factory, settings, now);
                Ok(value)
            }
            Classified::Fresh { index, entry } => {
                if index > 0 {
                    self.spawn_back_population(key, index, entry.clone());
                }
                Ok(entry.into_value())
            }
        }
    }

    fn validate_settings(settings: &CacheSettings) -> Result<(), Error> {
        if let Some(stale_after) = settings.stale_after()
            && (stale_after.is_zero() || stale_after >= settings.time_to_live())
        {
            return Err(Error::InvalidArgument(
                "stale_after must be positive and less than time_to_live",
            ));
        }
        Ok(())
    }

    async fn classify(&self, key: &str, settings: &CacheSettings, now: Instant) -> Classified<V> {
        match self.probe(key).await {
            None => Classified::Miss,
            Some((index, entry)) => {
                if entry.is_expired(now) {
                    Classified::Expired(entry)
                } else if entry.is_stale(settings, now) {
                    Classified::Stale(entry)
                } else {
                    Classified::Fresh { index, entry }
                }
            }
        }
    }

    /// Produces a fresh entry for `key` through the single-flight gate.
    async fn refresh<F, Fut>(
        &self,
        key: &str,
        previous: Option<CacheEntry<V>>,
        factory: F,
        settings: &CacheSettings,
        status: CacheEntryStatus,
        now: Instant,
    ) -> Result<CacheEntry<V>, Error>
    where
        F: FnOnce(Option<V>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, BoxError>> + Send + 'static,
    {
        loop {
            match self.inner.key_lock.try_acquire(key) {
                Acquire::Acquired => {
                    return self.run_refresh(key, previous, factory, settings, status, now).await;
                }
                Acquire::AlreadyHeld => {
                    // A refresh that finished between our probe and this
                    // acquisition may already have landed a usable entry.
                    if let Some((_, entry)) = self.probe(key).await {
                        let usable_until = entry.stale_date(settings).unwrap_or(entry.expiry());
                        if usable_until > now {
                            return Ok(entry);
                        }
                    }
                    match self.inner.key_lock.wait(key) {
                        Some(receiver) => match receiver.await {
                            Ok(result) => return result,
                            // The holder vanished without publishing; race
                            // for the lock ourselves.
                            Err(_cancelled) => {}
                        },
                        // Released between the probe and registration.
                        None => {}
                    }
                }
            }
        }
    }

    /// Runs the refresh pipeline. The caller must hold the key lock; the
    /// lock is released exactly once with the pipeline's outcome, also on
    /// cancellation.
    async fn run_refresh<F, Fut>(
        &self,
        key: &str,
        previous: Option<CacheEntry<V>>,
        factory: F,
        settings: &CacheSettings,
        status: CacheEntryStatus,
        now: Instant,
    ) -> Result<CacheEntry<V>, Error>
    where
        F: FnOnce(Option<V>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, BoxError>> + Send + 'static,
    {
        let mut guard = ReleaseGuard::new(self, key);

        // Another writer may have finished while we raced for the lock; a
        // miss settles for whatever it produced instead of recomputing.
        if status == CacheEntryStatus::Miss
            && let Some((_, entry)) = self.probe(key).await
            && !entry.is_expired(now)
        {
            guard.release(Ok(entry.clone()));
            return Ok(entry);
        }

        let update = if status == CacheEntryStatus::Miss {
            CacheUpdateType::AddEntry
        } else {
            CacheUpdateType::AddOrUpdateEntry
        };

        let pipeline = self.refresh_pipeline(key, previous, factory, settings.time_to_live(), update, now);
        let result = self.inner.extensions.with_refresh(key, settings, pipeline).await;
        guard.release(result.clone());
        result
    }

    /// Builds the innermost refresh future: run the factory, write the new
    /// entry through every layer, notify update listeners.
    fn refresh_pipeline<F, Fut>(
        &self,
        key: &str,
        previous: Option<CacheEntry<V>>,
        factory: F,
        time_to_live: Duration,
        update: CacheUpdateType,
        now: Instant,
    ) -> BoxFuture<'static, Result<CacheEntry<V>, Error>>
    where
        F: FnOnce(Option<V>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, BoxError>> + Send + 'static,
    {
        let stack = self.clone();
        let key = key.to_owned();
        Box::pin(async move {
            let previous_value = previous.map(CacheEntry::into_value);
            let value = factory(previous_value).await.map_err(|cause| Error::factory(cause))?;
            let entry = CacheEntry::new(value, now + time_to_live);
            stack.write_through(&key, entry.clone()).await?;
            stack.inner.extensions.on_update(&key, entry.expiry(), update).await?;
            Ok(entry)
        })
    }

    /// Fire-and-forget refresh for a stale hit. If the key is already
    /// being refreshed there is nothing to do; the caller has its value.
    fn spawn_stale_refresh<F, Fut>(&self, key: &str, entry: CacheEntry<V>, factory: F, settings: &CacheSettings, now: Instant)
    where
        F: FnOnce(Option<V>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, BoxError>> + Send + 'static,
    {
        let stack = self.clone();
        let owned_key = key.to_owned();
        let settings = settings.clone();
        let spawned = self.inner.runtime.spawn(async move {
            if stack.inner.key_lock.try_acquire(&owned_key) == Acquire::AlreadyHeld {
                return;
            }
            let refreshed = stack
                .run_refresh(&owned_key, Some(entry), factory, &settings, CacheEntryStatus::Stale, now)
                .await;
            if let Err(error) = refreshed {
                tracing::warn!(key = %owned_key, %error, "background refresh failed");
            }
        });
        if !spawned {
            tracing::debug!(key, status = ?CacheEntryStatus::Stale, "stale entry served without background refresh");
        }
    }

    /// Fire-and-forget copy of a lower-layer hit into the layers above it.
    ///
    /// Piggy-backs on the single-flight gate so it cannot clash with a
    /// concurrent refresh; if a writer is active it will populate every
    /// layer itself. Per-layer write failures are skipped, the entry is
    /// still delivered to any callers that queued up behind the gate.
    fn spawn_back_population(&self, key: &str, hit_index: usize, entry: CacheEntry<V>) {
        let stack = self.clone();
        let key = key.to_owned();
        self.inner.runtime.spawn(async move {
            if stack.inner.key_lock.try_acquire(&key) == Acquire::AlreadyHeld {
                return;
            }
            for index in (0..hit_index).rev() {
                let layer = &stack.inner.layers[index];
                if !layer.is_available(&key).await {
                    continue;
                }
                if let Err(error) = layer.set(&key, entry.clone()).await {
                    tracing::warn!(key = %key, index, %error, "back-population write failed");
                }
            }
            stack.inner.key_lock.release(&key, Ok(entry));
        });
    }
}

/// Releases the key lock exactly once, with an error if the refresh future
/// is dropped mid-flight, so no waiter ever hangs on a cancelled refresh.
struct ReleaseGuard<'a, V>
where
    V: Clone + Send + Sync + 'static,
{
    stack: &'a CacheStack<V>,
    key: &'a str,
    armed: bool,
}

impl<'a, V> ReleaseGuard<'a, V>
where
    V: Clone + Send + Sync + 'static,
{
    fn new(stack: &'a CacheStack<V>, key: &'a str) -> Self {
        Self { stack, key, armed: true }
    }

    fn release(&mut self, result: RefreshResult<V>) {
        self.armed = false;
        self.stack.inner.key_lock.release(self.key, result);
    }
}

impl<V> Drop for ReleaseGuard<'_, V>
where
    V: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if self.armed {
            self.stack
                .inner
                .key_lock
                .release(self.key, Err(Error::factory("refresh was cancelled before completion")));
        }
    }
}
