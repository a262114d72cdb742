//! A manually driven clock for deterministic tests

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tracing::warn;

use crate::{Clock, SharedClock, Timestamp, duration_to_timestamp};

/// A clock whose time only moves when the test moves it
///
/// Clones share the same underlying time
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    /// The current time
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock starting at the given time
    pub fn new(start: Timestamp) -> Self {
        Self { now: Arc::new(AtomicU64::new(start)) }
    }

    /// Get a shared handle to this clock
    pub fn shared(&self) -> SharedClock {
        Arc::new(self.clone())
    }

    /// Set the current time
    ///
    /// Moving the clock backwards is ignored, the clock stays monotonic
    pub fn set(&self, ts: Timestamp) {
        let prev = self.now.fetch_max(ts, Ordering::AcqRel);
        if ts < prev {
            warn!("ignoring attempt to move manual clock backwards: {prev} -> {ts}");
        }
    }

    /// Advance the clock by the given duration
    pub fn advance(&self, delta: Duration) {
        self.now.fetch_add(duration_to_timestamp(delta), Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::Acquire)
    }
}
