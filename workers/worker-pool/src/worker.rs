//! Defines the worker pool as a `Worker` that the coordinator can start, watch,
//! and tear down

use std::{
    mem,
    thread::{Builder, JoinHandle},
    time::Duration,
};

use common::{types::CancelChannel, worker::Worker};
use config::PoolConfig;
use rayon::ThreadPoolBuilder;
use sleepy_queue::{Priority, SleepyTaskQueue, TaskPayload};
use tracing::info;
use util::err_str;

use crate::{
    error::WorkerPoolError,
    maintenance::{MaintenanceDriver, TaskDispatcher, new_dispatch_queue},
    sleeper::Sleeper,
};

/// The name of the maintenance thread
const MAINTENANCE_THREAD_NAME: &str = "sleepy-maintenance";
/// The name of the dispatcher thread
const DISPATCHER_THREAD_NAME: &str = "sleepy-dispatcher";
/// The prefix of the executor pool's thread names
const EXECUTOR_THREAD_PREFIX: &str = "sleepy-executor";

// ----------
// | Config |
// ----------

/// The configuration of the worker pool
pub struct WorkerPoolConfig<P: TaskPayload> {
    /// The number of sleeper threads
    pub num_sleepers: usize,
    /// The minimum priority a sleeper swaps to
    pub priority_floor: Priority,
    /// The wait between swap attempts of an idle sleeper
    pub idle_poll_interval: Duration,
    /// The longest uninterrupted sleep of a sleeper holding a task
    pub max_sleep: Duration,
    /// The interval between maintenance sweeps
    pub maintenance_interval: Duration,
    /// The number of threads executing harvested tasks
    pub executor_threads: usize,
    /// The queue the pool drives
    pub queue: SleepyTaskQueue<P>,
    /// The channel on which the coordinator signals the pool to shut down
    pub cancel_channel: CancelChannel,
}

impl<P: TaskPayload> WorkerPoolConfig<P> {
    /// Build a worker pool config from a parsed pool config
    pub fn new(
        config: &PoolConfig,
        queue: SleepyTaskQueue<P>,
        cancel_channel: CancelChannel,
    ) -> Self {
        Self {
            num_sleepers: config.num_sleepers,
            priority_floor: config.priority_floor,
            idle_poll_interval: config.idle_poll_interval,
            max_sleep: config.max_sleep,
            maintenance_interval: config.maintenance_interval,
            executor_threads: config.executor_threads,
            queue,
            cancel_channel,
        }
    }
}

// ---------------
// | Worker Pool |
// ---------------

/// The worker pool: a group of sleepers, a maintenance driver, and a
/// dispatcher feeding an executor pool
pub struct WorkerPool<P: TaskPayload> {
    /// The config of the pool
    config: WorkerPoolConfig<P>,
    /// The join handles of every thread the pool spawned
    join_handles: Vec<JoinHandle<WorkerPoolError>>,
}

impl<P: TaskPayload> Worker for WorkerPool<P> {
    type WorkerConfig = WorkerPoolConfig<P>;
    type Error = WorkerPoolError;

    fn new(config: Self::WorkerConfig) -> Result<Self, Self::Error> {
        if config.num_sleepers == 0 || config.executor_threads == 0 {
            return Err(WorkerPoolError::Setup(
                "worker pool needs at least one sleeper and one executor".to_string(),
            ));
        }

        Ok(Self { config, join_handles: Vec::new() })
    }

    fn name(&self) -> String {
        "sleepy-worker-pool".to_string()
    }

    fn start(&mut self) -> Result<(), Self::Error> {
        info!(
            sleepers = self.config.num_sleepers,
            executors = self.config.executor_threads,
            "starting worker pool"
        );

        let thread_pool = ThreadPoolBuilder::new()
            .num_threads(self.config.executor_threads)
            .thread_name(|i| format!("{EXECUTOR_THREAD_PREFIX}-{i}"))
            .build()
            .map_err(err_str!(WorkerPoolError::Setup))?;
        let (dispatch_queue, job_queue) = new_dispatch_queue();

        for id in 0..self.config.num_sleepers {
            let sleeper = Sleeper {
                id,
                queue: self.config.queue.clone(),
                priority_floor: self.config.priority_floor,
                idle_poll_interval: self.config.idle_poll_interval,
                max_sleep: self.config.max_sleep,
                cancel_channel: self.config.cancel_channel.clone(),
            };
            self.spawn_thread(format!("sleeper-{id}"), move || sleeper.run())?;
        }

        let driver = MaintenanceDriver {
            queue: self.config.queue.clone(),
            interval: self.config.maintenance_interval,
            dispatch_queue,
            cancel_channel: self.config.cancel_channel.clone(),
        };
        self.spawn_thread(MAINTENANCE_THREAD_NAME.to_string(), move || driver.run())?;

        let dispatcher = TaskDispatcher {
            job_queue,
            thread_pool,
            cancel_channel: self.config.cancel_channel.clone(),
        };
        self.spawn_thread(DISPATCHER_THREAD_NAME.to_string(), move || dispatcher.run())
    }

    fn join(&mut self) -> Vec<JoinHandle<Self::Error>> {
        mem::take(&mut self.join_handles)
    }

    fn is_recoverable(&self) -> bool {
        false
    }

    fn cleanup(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl<P: TaskPayload> WorkerPool<P> {
    /// Spawn a named thread and track its join handle
    fn spawn_thread<F>(&mut self, name: String, f: F) -> Result<(), WorkerPoolError>
    where
        F: FnOnce() -> WorkerPoolError + Send + 'static,
    {
        let handle =
            Builder::new().name(name).spawn(f).map_err(err_str!(WorkerPoolError::Setup))?;
        self.join_handles.push(handle);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        thread,
        time::{Duration, Instant},
    };

    use common::{
        types::{CancelChannel, new_cancel_channel},
        worker::Worker,
    };
    use rand::{Rng, thread_rng};
    use sleepy_queue::{Priority, SleepyTaskQueue, Task, TaskPayload, mocks::MockPayload};
    use system_clock::{MonotonicClock, SharedClock, Timestamp, mock::ManualClock};

    use super::{WorkerPool, WorkerPoolConfig};
    use crate::error::WorkerPoolError;

    /// A payload that checks it never runs before its wake time
    struct TimedPayload {
        /// The payload's wake time
        wake_time: Timestamp,
        /// The payload's priority
        priority: Priority,
        /// The clock the queue runs on
        clock: SharedClock,
        /// The number of executions across all payloads
        executions: Arc<AtomicUsize>,
        /// The number of executions before the wake time
        early: Arc<AtomicUsize>,
    }

    impl TaskPayload for TimedPayload {
        fn priority(&self) -> Priority {
            self.priority
        }

        fn execute(&self) {
            if self.clock.now() < self.wake_time {
                self.early.fetch_add(1, Ordering::SeqCst);
            }

            self.executions.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Build a pool config with short intervals
    fn test_config<P: TaskPayload>(
        queue: SleepyTaskQueue<P>,
        cancel_channel: CancelChannel,
        priority_floor: Priority,
    ) -> WorkerPoolConfig<P> {
        WorkerPoolConfig {
            num_sleepers: 3,
            priority_floor,
            idle_poll_interval: Duration::from_millis(1),
            max_sleep: Duration::from_millis(5),
            maintenance_interval: Duration::from_millis(2),
            executor_threads: 2,
            queue,
            cancel_channel,
        }
    }

    /// Wait for a condition, failing after the given timeout
    fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + timeout;
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Tests that every task runs exactly once and never before its wake time
    #[test]
    fn test_pool_runs_all_tasks_once() {
        const N_TASKS: usize = 200;
        let clock = MonotonicClock::shared();
        let queue = SleepyTaskQueue::new(clock.clone());
        let (cancel_sender, cancel_channel) = new_cancel_channel();

        let mut pool = WorkerPool::new(test_config(queue.clone(), cancel_channel, 3)).unwrap();
        pool.start().unwrap();

        let executions = Arc::new(AtomicUsize::new(0));
        let early = Arc::new(AtomicUsize::new(0));
        let mut rng = thread_rng();
        for _ in 0..N_TASKS {
            let delay = Duration::from_millis(rng.gen_range(0..50));
            let wake_time = clock.deadline_after(delay);
            let payload = TimedPayload {
                wake_time,
                priority: rng.gen_range(0..8),
                clock: clock.clone(),
                executions: executions.clone(),
                early: early.clone(),
            };
            queue.insert_blocking(Task::new(payload, wake_time));
        }

        wait_for(Duration::from_secs(5), || executions.load(Ordering::SeqCst) == N_TASKS);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(executions.load(Ordering::SeqCst), N_TASKS);
        assert_eq!(early.load(Ordering::SeqCst), 0);

        cancel_sender.send(()).unwrap();
        for handle in pool.join() {
            assert!(matches!(handle.join().unwrap(), WorkerPoolError::Cancelled(_)));
        }
        assert!(queue.is_empty());
    }

    /// Tests that tasks below the sleepers' floor still run via maintenance
    #[test]
    fn test_below_floor_runs_via_maintenance() {
        let clock = ManualClock::new(0);
        let queue = SleepyTaskQueue::new(clock.shared());
        let (cancel_sender, cancel_channel) = new_cancel_channel();

        let mut pool = WorkerPool::new(test_config(queue.clone(), cancel_channel, 5)).unwrap();
        pool.start().unwrap();

        let executions = Arc::new(AtomicUsize::new(0));
        for id in 0..10 {
            let payload = MockPayload::with_counter(id, 1, executions.clone());
            queue.insert_blocking(Task::new(payload, 100 + id));
        }

        thread::sleep(Duration::from_millis(20));
        assert_eq!(executions.load(Ordering::SeqCst), 0);

        clock.set(200);
        wait_for(Duration::from_secs(1), || executions.load(Ordering::SeqCst) == 10);

        cancel_sender.send(()).unwrap();
        for handle in pool.join() {
            handle.join().unwrap();
        }
    }

    /// Tests that a pool without sleepers is rejected
    #[test]
    fn test_pool_requires_sleepers() {
        let queue = SleepyTaskQueue::<MockPayload>::new(ManualClock::new(0).shared());
        let (_cancel_sender, cancel_channel) = new_cancel_channel();
        let mut config = test_config(queue, cancel_channel, 0);
        config.num_sleepers = 0;

        assert!(matches!(WorkerPool::new(config), Err(WorkerPoolError::Setup(_))));
    }

    /// Tests that every thread of the pool exits on cancellation
    #[test]
    fn test_pool_cancellation() {
        let queue = SleepyTaskQueue::<MockPayload>::new(ManualClock::new(0).shared());
        let (cancel_sender, cancel_channel) = new_cancel_channel();
        let mut pool = WorkerPool::new(test_config(queue, cancel_channel, 0)).unwrap();
        pool.start().unwrap();

        cancel_sender.send(()).unwrap();
        let handles = pool.join();
        // Three sleepers, maintenance, and the dispatcher
        assert_eq!(handles.len(), 5);
        for handle in handles {
            assert!(matches!(handle.join().unwrap(), WorkerPoolError::Cancelled(_)));
        }
        assert!(pool.join().is_empty());
    }
}
