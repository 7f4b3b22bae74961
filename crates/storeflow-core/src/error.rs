use crate::domain::flow::{FlowId, SequenceId};
use thiserror::Error;

/// Core error type for the flow engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// A sequence inside a flow failed; coordinates are known
    #[error("sequence execution failed in flow {flow_id}, sequence {sequence_id}: {message}")]
    SequenceExecution {
        /// Flow the sequence belongs to
        flow_id: FlowId,
        /// The failing sequence
        sequence_id: SequenceId,
        /// Failure message
        message: String,
    },

    /// A flow failed before any sequence coordinates were known
    #[error("flow execution failed for flow {flow_id}: {message}")]
    FlowExecution {
        /// The failing flow
        flow_id: FlowId,
        /// Failure message
        message: String,
    },

    /// Raised by an action handler to request a rollback of its transaction
    #[error("transaction abort requested: {0}")]
    TransactionAbortRequested(String),

    /// Committing a transactional action failed
    #[error("transaction commit failed")]
    TransactionCommitFailed {
        /// The underlying commit failure
        #[source]
        source: Box<FlowError>,
    },

    /// A transactional action signalled that its transaction must be aborted
    #[error("transaction aborted by action")]
    TransactionAborted {
        /// The abort signal raised by the handler
        #[source]
        source: Box<FlowError>,
    },

    /// A transactional action failed with an unanticipated error
    #[error("uncaught error inside transactional action")]
    TransactionUncaught {
        /// The original handler failure
        #[source]
        source: Box<FlowError>,
    },

    /// Transaction handling failed outside the handler itself
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Flow state was accessed before the executor initialized it
    #[error("flow state not ready")]
    StateNotReady,

    /// No handler is registered under the requested action name
    #[error("flow action not found: {0}")]
    ActionNotFound(String),

    /// Rule evaluation error
    #[error("rule evaluation failed: {0}")]
    RuleEvaluation(String),

    /// App action payload could not be fetched
    #[error("app action error: {0}")]
    AppAction(String),

    /// Event bus error
    #[error("event bus error: {0}")]
    EventBus(String),

    /// Execution context could not be built from the event
    #[error("context setup error: {0}")]
    ContextSetup(String),

    /// Validation error
    #[error("validation error: {0}")]
    Validation(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl FlowError {
    /// Numeric code attached to structured log entries
    pub fn code(&self) -> u16 {
        match self {
            FlowError::SequenceExecution { .. } => 1,
            FlowError::FlowExecution { .. } => 2,
            FlowError::TransactionCommitFailed { .. } => 3,
            FlowError::TransactionAborted { .. } => 4,
            FlowError::TransactionUncaught { .. } => 5,
            FlowError::TransactionAbortRequested(_) => 40,
            FlowError::Transaction(_) => 41,
            FlowError::StateNotReady => 50,
            FlowError::ActionNotFound(_) => 51,
            FlowError::RuleEvaluation(_) => 52,
            FlowError::AppAction(_) => 53,
            FlowError::EventBus(_) => 54,
            FlowError::ContextSetup(_) => 55,
            FlowError::Validation(_) => 56,
            FlowError::Other(_) => 99,
        }
    }

    /// True for the failure kinds produced by the transactional action wrapper
    pub fn is_transaction_failure(&self) -> bool {
        matches!(
            self,
            FlowError::TransactionCommitFailed { .. }
                | FlowError::TransactionAborted { .. }
                | FlowError::TransactionUncaught { .. }
        )
    }
}
