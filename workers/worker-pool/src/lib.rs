//! The worker pool that drives a sleepy task queue
//!
//! The pool runs three kinds of threads:
//! - sleepers, each holding at most one task and sleeping until its wake
//!   time, swapping to a more urgent task whenever the queue offers one
//! - a maintenance driver, which periodically sweeps the queue for tasks that
//!   came due while nobody held them
//! - a dispatcher, which hands harvested tasks to an executor thread pool

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::needless_pass_by_ref_mut)]

use sleepy_queue::{TaskHandle, TaskPayload};
use tracing::instrument;

pub mod error;
mod maintenance;
mod metrics_helpers;
mod sleeper;
pub mod worker;

pub use error::WorkerPoolError;
pub use worker::{WorkerPool, WorkerPoolConfig};

/// Run a reserved task's payload and mark it complete
#[instrument(name = "execute_task", skip_all, fields(wake_time = handle.wake_time(), priority = handle.priority()))]
pub(crate) fn execute_task<P: TaskPayload>(handle: TaskHandle<P>) {
    handle.run();
    metrics_helpers::record_task_executed();
}
