//! Mock payloads for testing queues and the workers that drive them

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use crate::task::{Priority, TaskPayload};

/// A payload that counts its executions
#[derive(Clone, Debug)]
pub struct MockPayload {
    /// An identifier used by tests to tell payloads apart
    pub id: u64,
    /// The priority of the payload
    pub priority: Priority,
    /// The number of times the payload has executed
    executions: Arc<AtomicUsize>,
}

impl MockPayload {
    /// Constructor
    pub fn new(id: u64, priority: Priority) -> Self {
        Self { id, priority, executions: Arc::new(AtomicUsize::new(0)) }
    }

    /// Construct a payload which reports its executions to a shared counter
    pub fn with_counter(id: u64, priority: Priority, executions: Arc<AtomicUsize>) -> Self {
        Self { id, priority, executions }
    }

    /// A handle on the payload's execution counter
    pub fn executions(&self) -> Arc<AtomicUsize> {
        self.executions.clone()
    }
}

impl TaskPayload for MockPayload {
    fn priority(&self) -> Priority {
        self.priority
    }

    fn execute(&self) {
        self.executions.fetch_add(1, Ordering::SeqCst);
    }
}
