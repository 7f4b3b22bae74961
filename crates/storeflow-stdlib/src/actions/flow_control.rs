use async_trait::async_trait;
use storeflow_core::{FlowAction, FlowContext, FlowError};
use tracing::debug;

/// An action that stops the current flow
///
/// Remaining sequences of the flow are skipped; other flows for the
/// same event are unaffected.
pub struct StopFlowAction;

impl StopFlowAction {
    /// Create a stop action
    pub fn new() -> Self {
        Self
    }
}

impl Default for StopFlowAction {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FlowAction for StopFlowAction {
    fn name(&self) -> &str {
        "stop-flow"
    }

    async fn handle(&self, context: &mut FlowContext) -> Result<(), FlowError> {
        debug!(event = %context.event_name(), "flow stop requested");
        context.stop()
    }
}
