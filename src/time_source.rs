//! Where the engine gets "now" from.
//!
//! The engine never calls [`Local::now`] directly so that tests (and anything
//! embedding it) can drive time by hand with [`ManualClock`].

use std::sync::Arc;

use chrono::{DateTime, Duration, Local};
use parking_lot::Mutex;

pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// the wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Local>>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, now: DateTime<Local>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock()
    }
}
