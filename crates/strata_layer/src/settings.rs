// Copyright (c) The Strata Project Authors.

use std::time::Duration;

/// Freshness configuration for entries produced through a cache stack.
///
/// `time_to_live` is mandatory and bounds the lifetime of every entry a
/// refresh creates. `stale_after` optionally enables stale-while-revalidate:
/// an unexpired entry within `stale_after` of its expiry is served
/// immediately while a background refresh is scheduled.
///
/// A configured `stale_after` must be positive and strictly less than
/// `time_to_live`; the stack validates this on use.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use strata_layer::CacheSettings;
///
/// let settings = CacheSettings::new(Duration::from_secs(300))
///     .with_stale_after(Duration::from_secs(60));
///
/// assert_eq!(settings.time_to_live(), Duration::from_secs(300));
/// assert_eq!(settings.stale_after(), Some(Duration::from_secs(60)));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheSettings {
    time_to_live: Duration,
    stale_after: Option<Duration>,
}

impl CacheSettings {
    /// Creates settings with the given time-to-live and no background
    /// refresh.
    #[must_use]
    pub fn new(time_to_live: Duration) -> Self {
        Self {
            time_to_live,
            stale_after: None,
        }
    }

    /// Enables stale-while-revalidate with the given threshold.
    #[must_use]
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = Some(stale_after);
        self
    }

    /// Returns the lifetime of entries produced under these settings.
    #[must_use]
    pub fn time_to_live(&self) -> Duration {
        self.time_to_live
    }

    /// Returns the stale-while-revalidate threshold, if enabled.
    #[must_use]
    pub fn stale_after(&self) -> Option<Duration> {
        self.stale_after
    }
}
