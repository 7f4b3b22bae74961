//!
//! Storeflow Core - Flow execution engine for the Storeflow platform
//!
//! This crate defines the flow execution engine: it reacts to domain
//! events by locating configured flows, buffering them until a safe
//! lifecycle boundary, and walking each flow's sequence tree with
//! per-action transactional guarantees and failure isolation between
//! flows.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;

/// Domain layer - flows, events, execution context, external interfaces
pub mod domain;

/// Application services - dispatching, buffering, execution
pub mod application;

/// Core types
pub mod types;

/// Error types
pub mod error;

// Re-export key types
pub use error::FlowError;
pub use types::DataPacket;

// Domain model
pub use domain::context::{
    DefaultContextFactory, EventScope, FlowContext, FlowContextFactory, FlowState, LazyValue,
};
pub use domain::events::{
    AppActionEvent, AppActionPayload, AppActionSource, BusinessEvent, EventBus, FlowLogEvent,
};
pub use domain::flow::{ActionSequence, Flow, FlowId, IfSequence, RuleId, Sequence, SequenceId};
pub use domain::loader::{FlowBinding, FlowDefinitionLoader};
pub use domain::rules::RuleEvaluator;

// Application services
pub use application::buffered_executor::BufferedFlowExecutor;
pub use application::dispatcher::FlowDispatcher;
pub use application::executor::{
    ExecutionHooks, ExecutorConfig, FlowExecutor, NoopHooks, DEFAULT_MAX_DRAIN_ITERATIONS,
};
pub use application::lifecycle::{BufferedExecutorProvider, LifecycleSignal, LifecycleTrigger};
pub use application::queue::FlowQueue;
pub use application::registry::FlowActionRegistry;
pub use application::transaction::{run_transactional, Transaction, TransactionManager};

/// A handler implementing one flow action
///
/// Handlers are registered in the [`FlowActionRegistry`] at process
/// bootstrap and resolved by name when the executor reaches an action
/// sequence.
#[async_trait]
pub trait FlowAction: Send + Sync {
    /// The action name flows reference
    fn name(&self) -> &str;

    /// Data keys that must be resolved before the handler runs
    fn requirements(&self) -> &[String] {
        &[]
    }

    /// Whether the handler must run inside its own database transaction
    fn transactional(&self) -> bool {
        false
    }

    /// Execute the action against the current context
    async fn handle(&self, context: &mut FlowContext) -> Result<(), FlowError>;
}
