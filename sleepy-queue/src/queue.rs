//! The sleepy task queue: a mutex guarded, wake time ordered store of task
//! records
//!
//! The lock protects the store's membership and ordering. Each record's
//! status is atomic on its own, so a holder can release or complete its task
//! without taking the lock, and a scan under the lock observes those changes

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, TryLockError},
};

use system_clock::{SharedClock, Timestamp};
use tracing::{debug, trace, warn};

use crate::task::{Priority, Task, TaskHandle, TaskPayload, TaskRecord, TaskStatus};

/// The key of a record in the store
///
/// The sequence number breaks ties between equal wake times in insertion order
type StoreKey = (Timestamp, u64);

/// The ordered store of task records
struct TaskStore<P> {
    /// The records, ascending by wake time then insertion order
    tasks: BTreeMap<StoreKey, Arc<TaskRecord<P>>>,
    /// The sequence number assigned to the next insertion
    next_seq: u64,
}

impl<P> TaskStore<P> {
    /// Constructor
    fn new() -> Self {
        Self { tasks: BTreeMap::new(), next_seq: 0 }
    }

    /// Add a record to the store
    fn insert(&mut self, record: Arc<TaskRecord<P>>) {
        let key = (record.wake_time, self.next_seq);
        self.next_seq += 1;
        self.tasks.insert(key, record);
    }
}

/// The state shared by all handles to a queue
struct QueueInner<P> {
    /// The ordered store, guarded by the structural lock
    store: Mutex<TaskStore<P>>,
    /// The clock against which wake times are compared
    clock: SharedClock,
}

/// A deadline ordered task queue shared between producers, sleeping workers,
/// and a maintenance driver
///
/// Cloning the queue yields another handle to the same store
pub struct SleepyTaskQueue<P> {
    /// The shared queue state
    inner: Arc<QueueInner<P>>,
}

impl<P> Clone for SleepyTaskQueue<P> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<P: TaskPayload> SleepyTaskQueue<P> {
    /// Create an empty queue keyed on the given clock
    pub fn new(clock: SharedClock) -> Self {
        let inner = QueueInner { store: Mutex::new(TaskStore::new()), clock };
        Self { inner: Arc::new(inner) }
    }

    /// The clock the queue compares wake times against
    pub fn clock(&self) -> &SharedClock {
        &self.inner.clock
    }

    // -----------
    // | Locking |
    // -----------

    /// Acquire the structural lock, waiting if it is held
    ///
    /// Every mutation of the store is a single map operation, so a panic
    /// while the lock was held cannot leave the store inconsistent and a
    /// poisoned lock is safe to recover
    fn lock_store(&self) -> MutexGuard<'_, TaskStore<P>> {
        self.inner.store.lock().unwrap_or_else(|poisoned| {
            warn!("recovering poisoned task queue lock");
            poisoned.into_inner()
        })
    }

    /// Attempt to acquire the structural lock without waiting
    fn try_lock_store(&self) -> Option<MutexGuard<'_, TaskStore<P>>> {
        match self.inner.store.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::WouldBlock) => None,
            Err(TryLockError::Poisoned(poisoned)) => {
                warn!("recovering poisoned task queue lock");
                Some(poisoned.into_inner())
            },
        }
    }

    // -------------
    // | Insertion |
    // -------------

    /// Insert a task, waiting for the lock if necessary
    ///
    /// The task is visible to every swap and maintenance call that acquires
    /// the lock after this returns
    pub fn insert_blocking(&self, task: Task<P>) {
        let wake_time = task.wake_time();
        self.lock_store().insert(task.into_record());
        trace!(wake_time, "inserted task");
    }

    /// Insert a task only if the lock is free
    ///
    /// On contention nothing is inserted and the task is handed back so the
    /// caller may retry or fall back to [`Self::insert_blocking`]
    pub fn insert_nonblocking(&self, task: Task<P>) -> Result<(), Task<P>> {
        let Some(mut store) = self.try_lock_store() else {
            trace!("queue contended, insert deferred to caller");
            return Err(task);
        };

        let wake_time = task.wake_time();
        store.insert(task.into_record());
        trace!(wake_time, "inserted task");
        Ok(())
    }

    // ----------------------
    // | Opportunistic Swap |
    // ----------------------

    /// Trade the held task for the earliest unclaimed task whose priority is
    /// at least `priority_floor`, if that task wakes strictly earlier
    ///
    /// An empty `held` slot is treated as infinitely late, so any eligible
    /// task is taken. On success the previously held task, if any, is
    /// released back to the queue and `held` contains the new reservation.
    /// Returns `false` without changing any state if the lock is contended,
    /// no better task exists, or the held task was harvested and so cannot be
    /// given back to the queue
    pub fn try_swap(&self, priority_floor: Priority, held: &mut Option<TaskHandle<P>>) -> bool {
        if held.as_ref().is_some_and(TaskHandle::is_detached) {
            trace!("held task was harvested, skipping swap");
            return false;
        }

        let Some(store) = self.try_lock_store() else {
            trace!("queue contended, skipping swap");
            return false;
        };

        let held_wake_time = held.as_ref().map(TaskHandle::wake_time);
        for record in store.tasks.values() {
            if record.status.load() != TaskStatus::Unclaimed || record.priority() < priority_floor
            {
                continue;
            }

            // The store is ascending, so the first eligible record is the best
            // candidate; if it does not beat the held task nothing later will
            if held_wake_time.is_some_and(|held_wake| record.wake_time >= held_wake) {
                return false;
            }

            // A producer may have cancelled the record since the status read
            if !record.status.reserve() {
                continue;
            }

            let candidate = TaskHandle::reserved(record.clone());
            debug!(
                wake_time = record.wake_time,
                prev_wake_time = ?held_wake_time,
                "swapped to earlier task"
            );
            if let Some(prev) = held.replace(candidate) {
                prev.release();
            }

            return true;
        }

        false
    }

    // ---------------
    // | Maintenance |
    // ---------------

    /// Harvest every unclaimed task whose wake time has arrived and drop dead
    /// records
    ///
    /// Returns the harvested tasks in wake time order. They are removed from
    /// the queue and reserved by the returned handles; the caller is
    /// responsible for running them. Returns nothing if the lock is contended
    pub fn run_maintenance(&self) -> Vec<TaskHandle<P>> {
        let Some(mut store) = self.try_lock_store() else {
            trace!("queue contended, skipping maintenance");
            return Vec::new();
        };

        let now = self.inner.clock.now();
        let mut dead = Vec::new();
        let mut ready = Vec::new();
        for (key, record) in store.tasks.iter() {
            match record.status.load() {
                TaskStatus::Reserved => continue,
                TaskStatus::Dead => dead.push(*key),
                // Every later record wakes no earlier than this one
                TaskStatus::Unclaimed if record.wake_time > now => break,
                TaskStatus::Unclaimed => {
                    // Losing the claim means the record was just cancelled
                    if record.status.reserve() {
                        ready.push(*key);
                    } else {
                        dead.push(*key);
                    }
                },
            }
        }

        for key in dead.iter() {
            store.tasks.remove(key);
        }

        let harvested: Vec<_> = ready
            .into_iter()
            .filter_map(|key| store.tasks.remove(&key))
            .map(TaskHandle::harvested)
            .collect();

        if !harvested.is_empty() || !dead.is_empty() {
            debug!(
                now,
                harvested = harvested.len(),
                collected = dead.len(),
                remaining = store.tasks.len(),
                "ran queue maintenance"
            );
        }

        harvested
    }

    // ---------------
    // | Diagnostics |
    // ---------------

    /// The number of records in the store, including dead records not yet
    /// collected
    ///
    /// Waits for the lock
    pub fn len(&self) -> usize {
        self.lock_store().tasks.len()
    }

    /// Whether the store holds no records
    ///
    /// Waits for the lock
    pub fn is_empty(&self) -> bool {
        self.lock_store().tasks.is_empty()
    }

    /// The wake time and status of every record, in store order
    ///
    /// Waits for the lock
    pub fn snapshot(&self) -> Vec<(Timestamp, TaskStatus)> {
        self.lock_store()
            .tasks
            .values()
            .map(|record| (record.wake_time, record.status.load()))
            .collect()
    }
}
