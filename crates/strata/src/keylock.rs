// Copyright (c) The Strata Project Authors.

//! Per-key single-flight gate with waiter fan-out.
//!
//! The table serializes refreshes per key: exactly one caller acquires the
//! key and computes, everyone else registers a waiter and receives a clone
//! of the holder's outcome when it releases.

use std::collections::HashMap;

use futures::channel::oneshot;
use parking_lot::Mutex;
use strata_layer::CacheEntry;

use crate::Error;

/// Outcome of a lock acquisition attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Acquire {
    /// The caller now owns the key and must eventually release it.
    Acquired,
    /// Another caller owns the key.
    AlreadyHeld,
}

/// The outcome a holder publishes on release.
pub(crate) type RefreshResult<V> = Result<CacheEntry<V>, Error>;

struct Row<V> {
    waiters: Vec<oneshot::Sender<RefreshResult<V>>>,
}

/// Per-key mutual exclusion with waiter notification.
///
/// Row existence doubles as the "owner is computing" flag: a row is created
/// by the winning `try_acquire` and removed by `release`. A single mutex
/// guards the row map and every waiter list, so a waiter can never register
/// against a row that has already published. Critical sections only touch
/// the map; no I/O happens under the lock.
pub(crate) struct KeyLockTable<V> {
    rows: Mutex<HashMap<String, Row<V>>>,
}

impl<V> KeyLockTable<V>
where
    V: Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
        }
    }

    /// Attempts to take ownership of `key`.
    ///
    /// Exactly one caller per key observes [`Acquire::Acquired`] until the
    /// owner releases.
    pub(crate) fn try_acquire(&self, key: &str) -> Acquire {
        let mut rows = self.rows.lock();
        if rows.contains_key(key) {
            Acquire::AlreadyHeld
        } else {
            rows.insert(key.to_owned(), Row { waiters: Vec::new() });
            Acquire::Acquired
        }
    }

    /// Registers a waiter for the holder's outcome.
    ///
    /// Returns `None` when the key is no longer held, which means the
    /// holder released between the caller's state check and this
    /// registration; the caller should re-run its read instead of waiting.
    pub(crate) fn wait(&self, key: &str) -> Option<oneshot::Receiver<RefreshResult<V>>> {
        let mut rows = self.rows.lock();
        rows.get_mut(key).map(|row| {
            let (sender, receiver) = oneshot::channel();
            row.waiters.push(sender);
            receiver
        })
    }

    /// Frees `key` and delivers `result` to every registered waiter.
    ///
    /// Delivering to zero waiters discards the result. Releasing a key that
    /// is not held is a caller bug.
    pub(crate) fn release(&self, key: &str, result: RefreshResult<V>) {
        let row = self.rows.lock().remove(key);
        debug_assert!(row.is_some(), "release without a matching acquire");
        if let Some(row) = row {
            for waiter in row.waiters {
                // A waiter that gave up just drops its receiver.
                let _ = waiter.send(result.clone());
            }
        }
    }
}

impl<V> std::fmt::Debug for KeyLockTable<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyLockTable")
            .field("held_keys", &self.rows.lock().len())
            .finish()
    }
}
