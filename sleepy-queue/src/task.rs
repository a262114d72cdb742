//! The task record held by the queue and the handles through which workers
//! and producers act on it
//!
//! A record's status follows a small state machine:
//!     Unclaimed --reserve--> Reserved --release--> Unclaimed
//!     Reserved --complete--> Dead
//!     Unclaimed --cancel--> Dead
//! `Dead` is terminal; the record is dropped by the next maintenance sweep
//! that visits it

use std::{
    fmt::{self, Debug},
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
};

use system_clock::Timestamp;
use tracing::warn;

/// The priority of a task, larger values are more eligible for stealing
pub type Priority = u8;

/// The unit of work carried by a task
///
/// The queue itself only reads the priority; execution is the business of
/// whoever ends up holding the task when its deadline arrives
pub trait TaskPayload: Send + Sync + 'static {
    /// The priority of the payload, fixed for its lifetime
    fn priority(&self) -> Priority;
    /// Run the payload
    fn execute(&self);
}

// ----------
// | Status |
// ----------

/// The claim state of a task
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Nobody holds the task, it may be swapped to or harvested
    Unclaimed = 0,
    /// A worker holds the task
    Reserved = 1,
    /// The task completed or was cancelled, awaiting collection
    Dead = 2,
}

impl From<u8> for TaskStatus {
    fn from(value: u8) -> Self {
        match value {
            0 => TaskStatus::Unclaimed,
            1 => TaskStatus::Reserved,
            _ => TaskStatus::Dead,
        }
    }
}

/// A task status that may be read and written without the queue's lock
#[derive(Debug)]
pub(crate) struct AtomicTaskStatus(AtomicU8);

impl AtomicTaskStatus {
    /// A new, unclaimed status
    fn new() -> Self {
        Self(AtomicU8::new(TaskStatus::Unclaimed as u8))
    }

    /// Read the status
    pub(crate) fn load(&self) -> TaskStatus {
        self.0.load(Ordering::Acquire).into()
    }

    /// Transition from one status to another, returning whether the record
    /// was in the `from` status
    fn transition(&self, from: TaskStatus, to: TaskStatus) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Claim an unclaimed record
    ///
    /// Structural access is serialized by the queue lock, but producers may
    /// cancel a record without that lock, so the claim must not overwrite a
    /// concurrent `Unclaimed -> Dead` transition
    pub(crate) fn reserve(&self) -> bool {
        self.transition(TaskStatus::Unclaimed, TaskStatus::Reserved)
    }

    /// Return a reserved record to the pool, may only be called by its holder
    fn unclaim(&self) {
        self.0.store(TaskStatus::Unclaimed as u8, Ordering::Release);
    }

    /// Mark a reserved record dead, may only be called by its holder
    fn kill(&self) {
        self.0.store(TaskStatus::Dead as u8, Ordering::Release);
    }

    /// Release a reservation if one is still held, used on drop where the
    /// record may already be dead
    fn release_if_reserved(&self) -> bool {
        self.transition(TaskStatus::Reserved, TaskStatus::Unclaimed)
    }

    /// Cancel a record that has never been claimed, or was released
    fn cancel(&self) -> bool {
        self.transition(TaskStatus::Unclaimed, TaskStatus::Dead)
    }
}

// ----------
// | Record |
// ----------

/// The shared record behind every task handle
pub(crate) struct TaskRecord<P> {
    /// The time at which the task becomes eligible to run
    pub(crate) wake_time: Timestamp,
    /// The claim status of the task
    pub(crate) status: AtomicTaskStatus,
    /// The work itself
    pub(crate) payload: P,
}

impl<P: TaskPayload> TaskRecord<P> {
    /// The priority of the record's payload
    pub(crate) fn priority(&self) -> Priority {
        self.payload.priority()
    }
}

impl<P> Debug for TaskRecord<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRecord")
            .field("wake_time", &self.wake_time)
            .field("status", &self.status.load())
            .finish_non_exhaustive()
    }
}

// --------
// | Task |
// --------

/// A task that has been built by a producer but not yet inserted
pub struct Task<P> {
    /// The underlying record
    record: Arc<TaskRecord<P>>,
}

impl<P: TaskPayload> Task<P> {
    /// Create an unclaimed task that wakes at the given time
    pub fn new(payload: P, wake_time: Timestamp) -> Self {
        let record = TaskRecord { wake_time, status: AtomicTaskStatus::new(), payload };
        Self { record: Arc::new(record) }
    }

    /// The time at which the task becomes eligible to run
    pub fn wake_time(&self) -> Timestamp {
        self.record.wake_time
    }

    /// The priority of the task's payload
    pub fn priority(&self) -> Priority {
        self.record.priority()
    }

    /// Get a handle through which the producer may later cancel the task
    pub fn cancel_handle(&self) -> CancelHandle<P> {
        CancelHandle { record: self.record.clone() }
    }

    /// Consume the task, yielding the record to be stored
    pub(crate) fn into_record(self) -> Arc<TaskRecord<P>> {
        self.record
    }
}

impl<P> Debug for Task<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Task").field(&self.record).finish()
    }
}

// -----------
// | Handles |
// -----------

/// An exclusive reservation on a task
///
/// Only the owner of a handle may move the task out of `Reserved`. Dropping a
/// handle without completing it releases the reservation
pub struct TaskHandle<P: TaskPayload> {
    /// The reserved record
    record: Arc<TaskRecord<P>>,
    /// Whether the record has been removed from the queue's store
    detached: bool,
    /// Whether the holder has already moved the record out of `Reserved`
    settled: bool,
}

impl<P: TaskPayload> TaskHandle<P> {
    /// Wrap a record that the caller has just reserved and which remains in
    /// the store
    pub(crate) fn reserved(record: Arc<TaskRecord<P>>) -> Self {
        debug_assert_eq!(record.status.load(), TaskStatus::Reserved);
        Self { record, detached: false, settled: false }
    }

    /// Wrap a reserved record that has been removed from the store
    pub(crate) fn harvested(record: Arc<TaskRecord<P>>) -> Self {
        debug_assert_eq!(record.status.load(), TaskStatus::Reserved);
        Self { record, detached: true, settled: false }
    }

    // -----------
    // | Getters |
    // -----------

    /// The time at which the task becomes eligible to run
    pub fn wake_time(&self) -> Timestamp {
        self.record.wake_time
    }

    /// The priority of the task's payload
    pub fn priority(&self) -> Priority {
        self.record.priority()
    }

    /// The current status of the task
    pub fn status(&self) -> TaskStatus {
        self.record.status.load()
    }

    /// A reference to the task's payload
    pub fn payload(&self) -> &P {
        &self.record.payload
    }

    /// Whether the task's deadline has arrived at `now`
    pub fn is_ready(&self, now: Timestamp) -> bool {
        self.record.wake_time <= now
    }

    /// Whether the task was harvested out of the queue
    pub fn is_detached(&self) -> bool {
        self.detached
    }

    // ---------------
    // | Transitions |
    // ---------------

    /// Release the reservation, leaving the task unclaimed in the queue
    ///
    /// A harvested task is no longer in the queue and cannot be released;
    /// its record stays reserved and the task is reported lost
    pub fn release(mut self) {
        // Once unclaimed another thread may reserve the record, the drop
        // below must not touch it
        self.settled = true;
        if self.detached {
            warn!(
                wake_time = self.record.wake_time,
                "harvested task released without being run, it is lost"
            );
            return;
        }

        self.record.status.unclaim();
    }

    /// Mark the task dead, it will be collected by the next maintenance sweep
    /// if it is still in the queue
    pub fn complete(mut self) {
        self.settled = true;
        self.record.status.kill();
    }

    /// Execute the payload and complete the task
    pub fn run(self) {
        self.record.payload.execute();
        self.complete();
    }
}

impl<P: TaskPayload> Drop for TaskHandle<P> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }

        if self.record.status.release_if_reserved() && self.detached {
            warn!(
                wake_time = self.record.wake_time,
                "harvested task dropped without being run, it is lost"
            );
        }
    }
}

impl<P: TaskPayload> Debug for TaskHandle<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("record", &self.record)
            .field("detached", &self.detached)
            .field("settled", &self.settled)
            .finish()
    }
}

/// A producer's handle on a task it inserted, used to cancel it
#[derive(Clone)]
pub struct CancelHandle<P> {
    /// The record to cancel
    record: Arc<TaskRecord<P>>,
}

impl<P> CancelHandle<P> {
    /// Cancel the task if nobody holds it
    ///
    /// Returns `false` when the task is reserved or already dead; a reserved
    /// task can only be ended by its holder
    pub fn cancel(&self) -> bool {
        self.record.status.cancel()
    }

    /// The current status of the task
    pub fn status(&self) -> TaskStatus {
        self.record.status.load()
    }
}

impl<P> Debug for CancelHandle<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CancelHandle").field(&self.record).finish()
    }
}
