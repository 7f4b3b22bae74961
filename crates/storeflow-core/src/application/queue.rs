use crate::domain::events::BusinessEvent;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Process-local buffer of events awaiting flow execution
///
/// Written only by the dispatcher and drained only by the buffered
/// executor within one unit of work. FIFO, no deduplication: the same
/// event kind queued twice produces two independent executions.
#[derive(Default)]
pub struct FlowQueue {
    pending: Mutex<Vec<std::sync::Arc<dyn BusinessEvent>>>,
}

impl FlowQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event to the pending set
    pub fn queue_flow(&self, event: std::sync::Arc<dyn BusinessEvent>) {
        self.lock().push(event);
    }

    /// Return and clear the full pending set, in enqueue order
    pub fn dequeue_flows(&self) -> Vec<std::sync::Arc<dyn BusinessEvent>> {
        std::mem::take(&mut *self.lock())
    }

    /// Whether any events are pending
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Names of the pending events, used for diagnostics
    pub fn pending_event_names(&self) -> Vec<String> {
        self.lock()
            .iter()
            .map(|event| event.name().to_string())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<std::sync::Arc<dyn BusinessEvent>>> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
