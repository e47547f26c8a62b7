// Copyright (c) The Strata Project Authors.

//! Injectable time source.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::Mutex;

/// Provides the current time to the cache engine.
///
/// Working with time is notoriously difficult to test. The clock abstracts
/// the single time read the engine performs so tests can freeze and advance
/// time manually while production code pays a near-zero cost for reading
/// the system clock.
///
/// Clones share state: advancing one handle of a frozen clock advances
/// every clone, which keeps a stack and its layers in agreement about the
/// current time.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use strata_layer::Clock;
///
/// let clock = Clock::frozen();
/// let before = clock.instant();
///
/// clock.advance(Duration::from_secs(60));
/// assert_eq!(clock.instant(), before + Duration::from_secs(60));
/// ```
#[derive(Clone, Debug)]
pub struct Clock {
    state: Arc<State>,
}

#[derive(Debug)]
enum State {
    System,
    Frozen(Mutex<Instant>),
}

impl Clock {
    /// Creates a clock that reads the system's monotonic time.
    #[must_use]
    pub fn system() -> Self {
        Self {
            state: Arc::new(State::System),
        }
    }

    /// Creates a frozen clock starting at the current instant.
    ///
    /// A frozen clock only moves when [`advance`](Self::advance) is called.
    #[must_use]
    pub fn frozen() -> Self {
        Self::frozen_at(Instant::now())
    }

    /// Creates a frozen clock starting at the given instant.
    #[must_use]
    pub fn frozen_at(start: Instant) -> Self {
        Self {
            state: Arc::new(State::Frozen(Mutex::new(start))),
        }
    }

    /// Returns the current instant according to this clock.
    #[must_use]
    pub fn instant(&self) -> Instant {
        match &*self.state {
            State::System => Instant::now(),
            State::Frozen(now) => *now.lock(),
        }
    }

    /// Moves a frozen clock forward by `delta`.
    ///
    /// All clones of the clock observe the new time.
    ///
    /// # Panics
    ///
    /// Panics when called on a system clock; only frozen clocks can be
    /// driven manually.
    pub fn advance(&self, delta: Duration) {
        match &*self.state {
            State::System => panic!("advance requires a frozen clock"),
            State::Frozen(now) => {
                let mut now = now.lock();
                *now += delta;
            }
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::system()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_moves_forward() {
        let clock = Clock::system();
        let first = clock.instant();
        let second = clock.instant();
        assert!(second >= first);
    }

    #[test]
    fn frozen_clock_does_not_move_on_its_own() {
        let clock = Clock::frozen();
        assert_eq!(clock.instant(), clock.instant());
    }

    #[test]
    fn advance_moves_all_clones() {
        let clock = Clock::frozen();
        let clone = clock.clone();
        let start = clock.instant();

        clone.advance(Duration::from_secs(5));

        assert_eq!(clock.instant(), start + Duration::from_secs(5));
        assert_eq!(clone.instant(), start + Duration::from_secs(5));
    }

    #[test]
    #[should_panic(expected = "advance requires a frozen clock")]
    fn advance_panics_on_system_clock() {
        Clock::system().advance(Duration::from_secs(1));
    }
}
