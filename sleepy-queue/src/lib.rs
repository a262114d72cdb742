//! A deadline ordered task queue shared by a pool of sleeping workers
//!
//! Each worker holds at most one task and sleeps until that task's wake time.
//! While sleeping it may cheaply ask the queue whether a more urgent task
//! exists and trade its current task for it. A maintenance sweep harvests
//! tasks whose deadline has arrived without anyone claiming them, and drops
//! tasks that have been completed or cancelled.
//!
//! Besides `insert_blocking` and the diagnostic getters, no operation waits on
//! the queue's lock; they fail soft under contention and are retried by their
//! caller.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::needless_pass_by_ref_mut)]

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
pub mod queue;
pub mod task;

pub use queue::SleepyTaskQueue;
pub use task::{CancelHandle, Priority, Task, TaskHandle, TaskPayload, TaskStatus};
