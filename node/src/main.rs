//! The entrypoint to the sleepy node, starts the worker pool and watches it
//! until a worker fails or the process is asked to shut down

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

mod load;

use std::error::Error;

use common::{
    types::new_cancel_channel,
    worker::{Worker, watch_worker},
};
use load::LoadGenerator;
use sleepy_queue::SleepyTaskQueue;
use system_clock::MonotonicClock;
use tokio::{signal, sync::mpsc};
use tracing::{error, info, warn};
use util::telemetry::configure_logging;
use worker_pool::{WorkerPool, WorkerPoolConfig};

/// The entrypoint to the node's execution
///
/// The coordinator:
///     1. Parses the config and sets up logging
///     2. Allocates the queue and starts the worker pool
///     3. Optionally starts a synthetic load generator
///     4. Waits for a worker thread to exit or for a shutdown signal, then
///        cancels every worker and waits for all of its threads to exit
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = config::parse_command_line_args()?;
    configure_logging(args.log_level, args.json_logs)?;
    info!(
        sleepers = args.num_sleepers,
        priority_floor = args.priority_floor,
        executors = args.executor_threads,
        "sleepy node starting"
    );

    let queue = SleepyTaskQueue::new(MonotonicClock::shared());
    let (cancel_sender, cancel_channel) = new_cancel_channel();

    // Start the worker pool
    let pool_config = WorkerPoolConfig::new(&args, queue.clone(), cancel_channel.clone());
    let mut pool = WorkerPool::new(pool_config)?;
    pool.start()?;

    let (failure_sender, mut failure_receiver) = mpsc::channel(1 /* buffer size */);
    let n_pool_threads = watch_worker(&mut pool, &failure_sender)?;

    // Start the load generator
    let load_handle = if args.load_tasks_per_sec > 0 {
        let generator = LoadGenerator::new(
            queue,
            args.load_tasks_per_sec,
            args.load_max_delay,
            cancel_channel,
        );
        Some(generator.start()?)
    } else {
        None
    };

    let mut n_exited = 0;
    tokio::select! {
        _ = failure_receiver.recv() => {
            n_exited += 1;
            error!("worker pool thread exited, shutting down");
        },
        res = signal::ctrl_c() => {
            res?;
            info!("received shutdown signal");
        },
    }

    if cancel_sender.send(()).is_err() {
        warn!("every worker exited before cancellation");
    }

    // The dispatcher exits only once every harvested task has run
    while n_exited < n_pool_threads && failure_receiver.recv().await.is_some() {
        n_exited += 1;
    }
    info!("worker pool shut down");

    if let Some(handle) = load_handle {
        if handle.join().is_err() {
            error!("load generator panicked");
        }
    }

    pool.cleanup()?;
    Ok(())
}
