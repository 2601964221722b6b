//! Deterministic `Clock` implementations for tests.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use chronicle_core::clock::Clock;

/// A clock that always returns a fixed point in time.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// A clock that starts at `start_millis` and moves forward by `step_millis`
/// every time it is read.
#[derive(Debug)]
pub struct SteppingClock {
    next_millis: AtomicI64,
    step_millis: i64,
}

impl SteppingClock {
    /// Creates a clock whose first reading is `start_millis`.
    #[must_use]
    pub fn new(start_millis: i64, step_millis: i64) -> Self {
        Self {
            next_millis: AtomicI64::new(start_millis),
            step_millis,
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let millis = self.now_millis();
        Utc.timestamp_millis_opt(millis)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    fn now_millis(&self) -> i64 {
        self.next_millis.fetch_add(self.step_millis, Ordering::SeqCst)
    }
}
