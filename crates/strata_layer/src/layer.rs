// Copyright (c) The Strata Project Authors.

//! Cache layer trait.

use async_trait::async_trait;

use crate::{CacheEntry, Result};

/// Trait for cache layer implementations.
///
/// Implement this trait to create custom storage backends. A cache stack
/// fronts an ordered list of layers and owns all freshness policy; layers
/// only store, return and remove entries.
///
/// Two properties of the contract matter to implementors:
///
/// - `get` is raw: a layer MAY return an entry whose expiry has passed.
///   The stack classifies entries against its own clock, so layers never
///   need a time source to answer reads.
/// - `is_available` is a fast health probe. A remote layer should report
///   unavailable during an outage instead of failing `get`, so the stack
///   can fall through to the next layer without triggering a refresh
///   stampede.
///
/// `is_available` and `close` have defaults suitable for local in-process
/// layers.
#[async_trait]
pub trait CacheLayer<V>: Send + Sync {
    /// Gets the entry stored under `key`, if any.
    ///
    /// Expired entries are returned as-is; filtering is the caller's
    /// responsibility.
    async fn get(&self, key: &str) -> Result<Option<CacheEntry<V>>>;

    /// Stores `entry` under `key`, replacing any previous entry.
    async fn set(&self, key: &str, entry: CacheEntry<V>) -> Result<()>;

    /// Removes the entry stored under `key`, if any.
    async fn evict(&self, key: &str) -> Result<()>;

    /// Removes every entry from the layer.
    async fn flush(&self) -> Result<()>;

    /// Opportunistically removes expired entries.
    ///
    /// Layers without expiry bookkeeping may treat this as a no-op.
    async fn cleanup(&self) -> Result<()>;

    /// Returns true if the layer can currently serve `key`.
    ///
    /// Default implementation reports the layer as always available.
    async fn is_available(&self, key: &str) -> bool {
        let _ = key;
        true
    }

    /// Releases resources held by the layer.
    ///
    /// Default implementation is a no-op.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
