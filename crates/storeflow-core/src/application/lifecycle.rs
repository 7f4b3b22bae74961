use crate::application::buffered_executor::BufferedFlowExecutor;
use crate::application::queue::FlowQueue;
use crate::FlowError;
use std::sync::Arc;
use tracing::{debug, trace};

/// End-of-unit-of-work signals that trigger buffered flow execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSignal {
    /// One inbound request finished
    RequestFinished,

    /// One asynchronously consumed message finished
    JobFinished,

    /// One CLI command finished
    CommandFinished,
}

/// Provider invoked only when there is actually something to drain
pub type BufferedExecutorProvider = Arc<dyn Fn() -> Arc<BufferedFlowExecutor> + Send + Sync>;

/// Hooks the lifecycle boundaries of the host environment
///
/// Each call site (request teardown, job completion, command exit)
/// reports its signal here. The buffered executor is resolved lazily so
/// the common no-flow case never constructs the heavyweight execution
/// stack.
pub struct LifecycleTrigger {
    queue: Arc<FlowQueue>,
    provider: BufferedExecutorProvider,
}

impl LifecycleTrigger {
    /// Create a trigger over the given queue and executor provider
    pub fn new(queue: Arc<FlowQueue>, provider: BufferedExecutorProvider) -> Self {
        Self { queue, provider }
    }

    /// Handle one lifecycle signal
    pub async fn on_signal(&self, signal: LifecycleSignal) -> Result<(), FlowError> {
        if self.queue.is_empty() {
            trace!(signal = ?signal, "no buffered flows to execute");
            return Ok(());
        }

        debug!(signal = ?signal, "draining buffered flows");
        (self.provider)().execute_buffered_flows().await
    }
}
