// Copyright (c) The Strata Project Authors.

//! Dynamic layer wrapper for type erasure.

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;

use crate::{CacheEntry, CacheLayer, Result};

/// Extension trait for converting any [`CacheLayer`] into a
/// [`DynamicLayer`].
///
/// This trait is automatically implemented for all types that implement
/// `CacheLayer`.
pub trait DynamicLayerExt<V>: Sized {
    /// Converts this layer into a [`DynamicLayer`].
    fn into_dynamic(self) -> DynamicLayer<V>;
}

impl<V, L> DynamicLayerExt<V> for L
where
    V: Clone + Send + Sync + 'static,
    L: CacheLayer<V> + 'static,
{
    fn into_dynamic(self) -> DynamicLayer<V> {
        DynamicLayer::new(self)
    }
}

/// A clonable cache layer handle with type erasure.
///
/// `DynamicLayer` wraps a trait object in an `Arc` so an ordered list of
/// heterogeneous layers can live in a single `Vec<DynamicLayer<V>>`.
/// Cloning is cheap and shares the underlying layer.
pub struct DynamicLayer<V>(Arc<dyn CacheLayer<V>>);

impl<V> DynamicLayer<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a new dynamic layer from any [`CacheLayer`] implementation.
    pub fn new<L>(layer: L) -> Self
    where
        L: CacheLayer<V> + 'static,
    {
        Self(Arc::new(layer))
    }
}

impl<V> Debug for DynamicLayer<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicLayer").finish()
    }
}

impl<V> Clone for DynamicLayer<V> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

#[async_trait]
impl<V> CacheLayer<V> for DynamicLayer<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<CacheEntry<V>>> {
        self.0.get(key).await
    }

    async fn set(&self, key: &str, entry: CacheEntry<V>) -> Result<()> {
        self.0.set(key, entry).await
    }

    async fn evict(&self, key: &str) -> Result<()> {
        self.0.evict(key).await
    }

    async fn flush(&self) -> Result<()> {
        self.0.flush().await
    }

    async fn cleanup(&self) -> Result<()> {
        self.0.cleanup().await
    }

    async fn is_available(&self, key: &str) -> bool {
        self.0.is_available(key).await
    }

    async fn close(&self) -> Result<()> {
        self.0.close().await
    }
}
