//! The maintenance driver and the dispatcher that executes what it harvests
//!
//! Maintenance sweeps are short and run on a fixed cadence; execution of the
//! harvested tasks is handed off over a channel so that a slow payload never
//! delays the next sweep

use std::{thread, time::Duration};

use common::types::{CancelChannel, is_cancelled};
use crossbeam::{
    channel::{Receiver, Sender},
    sync::WaitGroup,
};
use rayon::ThreadPool;
use sleepy_queue::{SleepyTaskQueue, TaskHandle, TaskPayload};
use tracing::{debug, info};

use crate::{error::WorkerPoolError, execute_task, metrics_helpers::record_sweep};

/// The queue on which harvested tasks are sent to the dispatcher
pub(crate) type DispatchQueue<P> = Sender<TaskHandle<P>>;
/// The receiving end of the dispatch queue
pub(crate) type DispatchReceiver<P> = Receiver<TaskHandle<P>>;

/// Create a new dispatch queue and receiver
pub(crate) fn new_dispatch_queue<P: TaskPayload>() -> (DispatchQueue<P>, DispatchReceiver<P>) {
    crossbeam::channel::unbounded()
}

// ----------------------
// | Maintenance Driver |
// ----------------------

/// Periodically sweeps the queue for due tasks and dead records
pub(crate) struct MaintenanceDriver<P: TaskPayload> {
    /// The queue to sweep
    pub(crate) queue: SleepyTaskQueue<P>,
    /// The interval between sweeps
    pub(crate) interval: Duration,
    /// The queue on which to send harvested tasks
    pub(crate) dispatch_queue: DispatchQueue<P>,
    /// The channel on which the coordinator signals shutdown
    pub(crate) cancel_channel: CancelChannel,
}

impl<P: TaskPayload> MaintenanceDriver<P> {
    /// The main loop, returns the reason the driver stopped
    pub(crate) fn run(self) -> WorkerPoolError {
        loop {
            if is_cancelled(&self.cancel_channel) {
                info!("maintenance driver cancelled, shutting down...");
                return WorkerPoolError::cancelled();
            }

            // A contended sweep harvests nothing; the next tick retries
            let harvested = self.queue.run_maintenance();
            record_sweep(harvested.len());
            for handle in harvested {
                if self.dispatch_queue.send(handle).is_err() {
                    return WorkerPoolError::DispatchQueueClosed(
                        "dispatcher hung up".to_string(),
                    );
                }
            }

            thread::sleep(self.interval);
        }
    }
}

// --------------
// | Dispatcher |
// --------------

/// Receives harvested tasks and runs them on the executor pool
pub(crate) struct TaskDispatcher<P: TaskPayload> {
    /// The queue of harvested tasks
    pub(crate) job_queue: DispatchReceiver<P>,
    /// The pool that executes the tasks
    pub(crate) thread_pool: ThreadPool,
    /// The channel on which the coordinator signals shutdown
    pub(crate) cancel_channel: CancelChannel,
}

impl<P: TaskPayload> TaskDispatcher<P> {
    /// The main loop, returns the reason the dispatcher stopped
    ///
    /// Harvested tasks are no longer in the queue, so the dispatcher runs
    /// until the maintenance driver hangs up, which it does once cancelled,
    /// and then waits for every task it dispatched to finish
    pub(crate) fn run(self) -> WorkerPoolError {
        let in_flight = WaitGroup::new();
        let mut n_dispatched = 0usize;
        for handle in self.job_queue.iter() {
            let task_ref = in_flight.clone();
            self.thread_pool.spawn_fifo(move || {
                execute_task(handle);
                drop(task_ref);
            });
            n_dispatched += 1;
        }

        debug!(n_dispatched, "dispatch queue closed, waiting on in-flight tasks");
        in_flight.wait();

        if is_cancelled(&self.cancel_channel) {
            info!("task dispatcher cancelled, shutting down...");
            WorkerPoolError::cancelled()
        } else {
            WorkerPoolError::DispatchQueueClosed("maintenance driver hung up".to_string())
        }
    }
}
