//! The sleeper loop: hold one task, sleep until it is due, and trade it for a
//! more urgent one whenever the queue has one

use std::{thread, time::Duration};

use common::types::{CancelChannel, is_cancelled};
use sleepy_queue::{Priority, SleepyTaskQueue, TaskHandle, TaskPayload};
use tracing::{debug, info};

use crate::{error::WorkerPoolError, execute_task, metrics_helpers::record_swap};

/// A single sleeper thread's state
pub(crate) struct Sleeper<P: TaskPayload> {
    /// The index of the sleeper within the pool
    pub(crate) id: usize,
    /// The queue to take tasks from
    pub(crate) queue: SleepyTaskQueue<P>,
    /// The minimum priority of a task this sleeper swaps to
    pub(crate) priority_floor: Priority,
    /// How long to wait between attempts while holding nothing
    pub(crate) idle_poll_interval: Duration,
    /// The longest sleep while holding a task
    ///
    /// Bounds how late the sleeper notices a more urgent task or a cancel
    pub(crate) max_sleep: Duration,
    /// The channel on which the coordinator signals shutdown
    pub(crate) cancel_channel: CancelChannel,
}

impl<P: TaskPayload> Sleeper<P> {
    /// The main loop, returns the reason the sleeper stopped
    pub(crate) fn run(self) -> WorkerPoolError {
        debug!(sleeper = self.id, floor = self.priority_floor, "starting sleeper");
        let mut held: Option<TaskHandle<P>> = None;

        loop {
            if is_cancelled(&self.cancel_channel) {
                // Give the held task back so another thread may run it
                if let Some(handle) = held.take() {
                    handle.release();
                }

                info!(sleeper = self.id, "sleeper cancelled, shutting down...");
                return WorkerPoolError::cancelled();
            }

            // A failed swap is either contention or nothing better; both mean
            // keep what we have
            if self.queue.try_swap(self.priority_floor, &mut held) {
                record_swap();
            }

            let sleep_for = match held.take() {
                Some(handle) if handle.is_ready(self.queue.clock().now()) => {
                    execute_task(handle);
                    continue;
                },
                Some(handle) => {
                    let remaining = self.queue.clock().until(handle.wake_time());
                    held = Some(handle);
                    remaining.min(self.max_sleep)
                },
                None => self.idle_poll_interval,
            };

            thread::sleep(sleep_for);
        }
    }
}

#[cfg(test)]
mod test {
    use std::{
        sync::atomic::Ordering,
        thread,
        time::{Duration, Instant},
    };

    use common::types::new_cancel_channel;
    use sleepy_queue::{SleepyTaskQueue, Task, TaskStatus, mocks::MockPayload};
    use system_clock::mock::ManualClock;

    use super::Sleeper;
    use crate::error::WorkerPoolError;

    /// Wait for a condition, failing after a second
    fn wait_for(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(1);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Tests that a sleeper holds a future task, runs it once due, and hands
    /// back nothing on cancellation
    #[test]
    fn test_sleeper_runs_held_task() {
        let clock = ManualClock::new(0);
        let queue = SleepyTaskQueue::new(clock.shared());
        let (cancel_sender, cancel_channel) = new_cancel_channel();

        let payload = MockPayload::new(1, 5);
        let executions = payload.executions();
        let task = Task::new(payload, 100);
        let status = task.cancel_handle();
        queue.insert_blocking(task);

        let sleeper = Sleeper {
            id: 0,
            queue: queue.clone(),
            priority_floor: 1,
            idle_poll_interval: Duration::from_millis(1),
            max_sleep: Duration::from_millis(5),
            cancel_channel,
        };
        let handle = thread::spawn(move || sleeper.run());

        // The sleeper claims the task but does not run it early
        wait_for(|| status.status() == TaskStatus::Reserved);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(executions.load(Ordering::SeqCst), 0);

        clock.set(100);
        wait_for(|| executions.load(Ordering::SeqCst) == 1);
        assert_eq!(status.status(), TaskStatus::Dead);

        cancel_sender.send(()).unwrap();
        assert!(matches!(handle.join().unwrap(), WorkerPoolError::Cancelled(_)));
    }

    /// Tests that a cancelled sleeper releases its reservation
    #[test]
    fn test_sleeper_releases_on_cancel() {
        let clock = ManualClock::new(0);
        let queue = SleepyTaskQueue::new(clock.shared());
        let (cancel_sender, cancel_channel) = new_cancel_channel();

        let task = Task::new(MockPayload::new(1, 5), 1_000);
        let status = task.cancel_handle();
        queue.insert_blocking(task);

        let sleeper = Sleeper {
            id: 0,
            queue: queue.clone(),
            priority_floor: 0,
            idle_poll_interval: Duration::from_millis(1),
            max_sleep: Duration::from_millis(5),
            cancel_channel,
        };
        let handle = thread::spawn(move || sleeper.run());
        wait_for(|| status.status() == TaskStatus::Reserved);

        cancel_sender.send(()).unwrap();
        handle.join().unwrap();
        assert_eq!(status.status(), TaskStatus::Unclaimed);
        assert_eq!(queue.snapshot(), vec![(1_000, TaskStatus::Unclaimed)]);
    }

    /// Tests that a sleeper ignores tasks below its priority floor
    #[test]
    fn test_sleeper_respects_floor() {
        let clock = ManualClock::new(0);
        let queue = SleepyTaskQueue::new(clock.shared());
        let (cancel_sender, cancel_channel) = new_cancel_channel();

        let task = Task::new(MockPayload::new(1, 1), 0);
        let status = task.cancel_handle();
        queue.insert_blocking(task);

        let sleeper = Sleeper {
            id: 0,
            queue: queue.clone(),
            priority_floor: 2,
            idle_poll_interval: Duration::from_millis(1),
            max_sleep: Duration::from_millis(5),
            cancel_channel,
        };
        let handle = thread::spawn(move || sleeper.run());
        thread::sleep(Duration::from_millis(20));
        assert_eq!(status.status(), TaskStatus::Unclaimed);

        cancel_sender.send(()).unwrap();
        handle.join().unwrap();
    }
}
