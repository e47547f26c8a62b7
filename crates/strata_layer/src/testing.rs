// Copyright (c) The Strata Project Authors.
// Licensed under the MIT License.

//! Mock layer implementation for testing.
//!
//! This module provides [`MockLayer`], a configurable in-memory layer that
//! records all operations and supports failure injection and forced
//! unavailability for testing the stack's error paths.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{CacheEntry, CacheLayer, LayerError, Result};

/// Recorded layer operation with full context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerOp<V> {
    /// A get operation was performed with the given key.
    Get(String),
    /// A set operation was performed with the given key and entry.
    Set {
        /// The key that was written.
        key: String,
        /// The entry that was written.
        entry: CacheEntry<V>,
    },
    /// An evict operation was performed with the given key.
    Evict(String),
    /// A flush operation was performed.
    Flush,
    /// A cleanup operation was performed.
    Cleanup,
    /// The layer was closed.
    Close,
}

type FailPredicate<V> = Box<dyn Fn(&LayerOp<V>) -> bool + Send + Sync>;

/// A configurable mock layer for testing.
///
/// The layer stores entries in memory and can be configured to fail
/// operations on demand or to report itself unavailable. All operations
/// are recorded for later verification.
///
/// # Failure injection
///
/// ```no_run
/// use strata_layer::{CacheLayer, testing::{LayerOp, MockLayer}};
///
/// # async fn example() {
/// let layer: MockLayer<i32> = MockLayer::new();
///
/// // Fail gets for one specific key only.
/// layer.fail_when(|op| matches!(op, LayerOp::Get(k) if k == "forbidden"));
/// assert!(layer.get("forbidden").await.is_err());
/// assert!(layer.get("allowed").await.is_ok());
/// # }
/// ```
pub struct MockLayer<V> {
    data: Arc<Mutex<HashMap<String, CacheEntry<V>>>>,
    operations: Arc<Mutex<Vec<LayerOp<V>>>>,
    fail_when: Arc<Mutex<Option<FailPredicate<V>>>>,
    available: Arc<AtomicBool>,
}

impl<V> std::fmt::Debug for MockLayer<V>
where
    V: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLayer")
            .field("data", &self.data)
            .field("operations", &self.operations)
            .field("fail_when", &self.fail_when.lock().is_some())
            .field("available", &self.available.load(Ordering::Relaxed))
            .finish()
    }
}

impl<V> Clone for MockLayer<V> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            operations: Arc::clone(&self.operations),
            fail_when: Arc::clone(&self.fail_when),
            available: Arc::clone(&self.available),
        }
    }
}

impl<V> Default for MockLayer<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MockLayer<V> {
    /// Creates a new empty mock layer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
            operations: Arc::new(Mutex::new(Vec::new())),
            fail_when: Arc::new(Mutex::new(None)),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Creates a mock layer with pre-populated data.
    #[must_use]
    pub fn with_data(data: HashMap<String, CacheEntry<V>>) -> Self {
        let layer = Self::new();
        *layer.data.lock() = data;
        layer
    }

    /// Returns the number of entries in the layer.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.data.lock().len()
    }

    /// Returns true if the layer contains the given key.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.lock().contains_key(key)
    }

    /// Controls what `is_available` reports.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }
}

impl<V> MockLayer<V>
where
    V: Clone,
{
    /// Sets a predicate that determines when operations should fail.
    ///
    /// The predicate receives the operation and returns `true` if it
    /// should fail. Failed operations are still recorded.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&LayerOp<V>) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Clears the failure predicate, allowing all operations to succeed.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// Returns a clone of all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<LayerOp<V>> {
        self.operations.lock().clone()
    }

    /// Clears all recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    fn record(&self, op: LayerOp<V>) {
        self.operations.lock().push(op);
    }

    fn should_fail(&self, op: &LayerOp<V>) -> bool {
        self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(op))
    }
}

#[async_trait]
impl<V> CacheLayer<V> for MockLayer<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<CacheEntry<V>>> {
        let op = LayerOp::Get(key.to_owned());
        let fail = self.should_fail(&op);
        self.record(op);
        if fail {
            return Err(LayerError::new("mock: get failed"));
        }
        Ok(self.data.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, entry: CacheEntry<V>) -> Result<()> {
        let op = LayerOp::Set {
            key: key.to_owned(),
            entry: entry.clone(),
        };
        let fail = self.should_fail(&op);
        self.record(op);
        if fail {
            return Err(LayerError::new("mock: set failed"));
        }
        self.data.lock().insert(key.to_owned(), entry);
        Ok(())
    }

    async fn evict(&self, key: &str) -> Result<()> {
        let op = LayerOp::Evict(key.to_owned());
        let fail = self.should_fail(&op);
        self.record(op);
        if fail {
            return Err(LayerError::new("mock: evict failed"));
        }
        self.data.lock().remove(key);
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        let op = LayerOp::Flush;
        let fail = self.should_fail(&op);
        self.record(op);
        if fail {
            return Err(LayerError::new("mock: flush failed"));
        }
        self.data.lock().clear();
        Ok(())
    }

    async fn cleanup(&self) -> Result<()> {
        let op = LayerOp::Cleanup;
        let fail = self.should_fail(&op);
        self.record(op);
        if fail {
            return Err(LayerError::new("mock: cleanup failed"));
        }
        Ok(())
    }

    async fn is_available(&self, _key: &str) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    async fn close(&self) -> Result<()> {
        let op = LayerOp::Close;
        let fail = self.should_fail(&op);
        self.record(op);
        if fail {
            return Err(LayerError::new("mock: close failed"));
        }
        Ok(())
    }
}
