// Copyright (c) The Strata Project Authors.

use std::{ops::Deref, time::Instant};

use crate::CacheSettings;

/// A cached value with an absolute expiry.
///
/// Entries are immutable once created: a refresh or an overwrite produces a
/// new entry rather than mutating one in place. An entry does not know
/// whether it is fresh; callers classify it against a clock reading using
/// [`is_expired`](Self::is_expired) and [`is_stale`](Self::is_stale).
///
/// # Examples
///
/// ```
/// use std::time::{Duration, Instant};
///
/// use strata_layer::CacheEntry;
///
/// let now = Instant::now();
/// let entry = CacheEntry::new(42, now + Duration::from_secs(60));
///
/// assert_eq!(*entry.value(), 42);
/// assert!(!entry.is_expired(now));
/// assert!(entry.is_expired(now + Duration::from_secs(60)));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry<V> {
    value: V,
    expiry: Instant,
}

impl<V> CacheEntry<V> {
    /// Creates a new cache entry expiring at `expiry`.
    pub fn new(value: V, expiry: Instant) -> Self {
        Self { value, expiry }
    }

    /// Returns a reference to the cached value.
    #[must_use]
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Consumes the entry and returns the inner value.
    #[must_use]
    pub fn into_value(self) -> V {
        self.value
    }

    /// Returns the instant after which the entry must no longer be served.
    #[must_use]
    pub fn expiry(&self) -> Instant {
        self.expiry
    }

    /// Returns true if the entry is expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expiry <= now
    }

    /// Returns the instant at which this entry becomes stale.
    ///
    /// The stale date is `expiry - stale_after`. Returns `None` when the
    /// settings do not enable stale-while-revalidate.
    #[must_use]
    pub fn stale_date(&self, settings: &CacheSettings) -> Option<Instant> {
        settings
            .stale_after()
            .and_then(|stale_after| self.expiry.checked_sub(stale_after))
    }

    /// Returns true if the entry is past its stale date at `now`.
    ///
    /// A stale entry is still servable; it signals that a background
    /// refresh should be scheduled. Always false when the settings do not
    /// enable stale-while-revalidate.
    #[must_use]
    pub fn is_stale(&self, settings: &CacheSettings, now: Instant) -> bool {
        self.stale_date(settings).is_some_and(|stale_date| stale_date < now)
    }
}

impl<V> Deref for CacheEntry<V> {
    type Target = V;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}
