//! A monotonic clock that workers and queues use to order deadlines
//!
//! Time is expressed as a [`Timestamp`], the number of nanoseconds elapsed
//! since the clock's origin. Timestamps from different clock instances are not
//! comparable; a queue and the workers that drive it must share one clock.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(unsafe_code)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::needless_pass_by_ref_mut)]

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

#[cfg(feature = "mocks")]
pub mod mock;

/// A point in monotonic time, in nanoseconds since the clock's origin
pub type Timestamp = u64;
/// A clock shared between the threads of a process
pub type SharedClock = Arc<dyn Clock>;

/// Convert a duration into the timestamp domain, saturating at `u64::MAX`
pub fn duration_to_timestamp(duration: Duration) -> Timestamp {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// Convert a timestamp delta back into a duration
pub fn timestamp_to_duration(ts: Timestamp) -> Duration {
    Duration::from_nanos(ts)
}

/// A source of monotonically non-decreasing timestamps
pub trait Clock: Send + Sync + 'static {
    /// The current time
    fn now(&self) -> Timestamp;

    /// The timestamp `delay` after the current time
    fn deadline_after(&self, delay: Duration) -> Timestamp {
        self.now().saturating_add(duration_to_timestamp(delay))
    }

    /// The duration remaining until `deadline`, zero if it has passed
    fn until(&self, deadline: Timestamp) -> Duration {
        timestamp_to_duration(deadline.saturating_sub(self.now()))
    }
}

/// A clock backed by the operating system's monotonic clock
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    /// The instant that maps to timestamp zero
    origin: Instant,
}

impl MonotonicClock {
    /// Create a new clock whose origin is the current instant
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }

    /// Create a new clock and wrap it for sharing
    pub fn shared() -> SharedClock {
        Arc::new(Self::new())
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        duration_to_timestamp(self.origin.elapsed())
    }
}
