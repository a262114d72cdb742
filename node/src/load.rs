//! A synthetic load generator that schedules logged tasks on the queue

use std::{
    thread::{self, Builder, JoinHandle},
    time::Duration,
};

use common::types::{CancelChannel, is_cancelled};
use rand::{Rng, thread_rng};
use sleepy_queue::{Priority, SleepyTaskQueue, Task, TaskPayload};
use system_clock::{SharedClock, Timestamp};
use tracing::{debug, info};

/// The name of the load generator thread
const LOAD_THREAD_NAME: &str = "load-generator";
/// The exclusive upper bound on synthetic task priorities
const MAX_PRIORITY: Priority = 8;
/// One in this many synthetic tasks is cancelled right after insertion
const CANCEL_ONE_IN: u64 = 10;

/// A task that logs how late it ran
pub struct LoggedTask {
    /// The index of the task in the generated sequence
    id: u64,
    /// The task's priority
    priority: Priority,
    /// The wake time the task was scheduled for
    wake_time: Timestamp,
    /// The clock the queue runs on
    clock: SharedClock,
}

impl TaskPayload for LoggedTask {
    fn priority(&self) -> Priority {
        self.priority
    }

    fn execute(&self) {
        let lateness = self.clock.now().saturating_sub(self.wake_time);
        info!(
            id = self.id,
            priority = self.priority,
            lateness_us = lateness / 1_000,
            "executed synthetic task"
        );
    }
}

/// Schedules synthetic tasks at a fixed rate until cancelled
pub struct LoadGenerator {
    /// The queue to schedule on
    queue: SleepyTaskQueue<LoggedTask>,
    /// The interval between insertions
    interval: Duration,
    /// The longest delay before a task wakes
    max_delay: Duration,
    /// The channel on which the coordinator signals shutdown
    cancel_channel: CancelChannel,
}

impl LoadGenerator {
    /// Constructor
    pub fn new(
        queue: SleepyTaskQueue<LoggedTask>,
        tasks_per_sec: u64,
        max_delay: Duration,
        cancel_channel: CancelChannel,
    ) -> Self {
        let interval = Duration::from_secs_f64(1. / tasks_per_sec.max(1) as f64);
        Self { queue, interval, max_delay, cancel_channel }
    }

    /// Spawn the generator's thread
    pub fn start(self) -> std::io::Result<JoinHandle<()>> {
        Builder::new().name(LOAD_THREAD_NAME.to_string()).spawn(move || self.run())
    }

    /// The main loop
    fn run(self) {
        info!(interval = ?self.interval, "starting load generator");
        let clock = self.queue.clock().clone();
        let mut rng = thread_rng();
        let mut id = 0u64;

        while !is_cancelled(&self.cancel_channel) {
            let delay = rng.gen_range(Duration::ZERO..=self.max_delay);
            let wake_time = clock.deadline_after(delay);
            let priority = rng.gen_range(0..MAX_PRIORITY);
            let payload = LoggedTask { id, priority, wake_time, clock: clock.clone() };

            let task = Task::new(payload, wake_time);
            let cancel = task.cancel_handle();
            if let Err(task) = self.queue.insert_nonblocking(task) {
                self.queue.insert_blocking(task);
            }

            if id % CANCEL_ONE_IN == 0 && cancel.cancel() {
                debug!(id, "cancelled synthetic task");
            }

            id += 1;
            thread::sleep(self.interval);
        }

        info!(scheduled = id, "load generator cancelled, shutting down...");
    }
}
