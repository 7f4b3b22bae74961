//! Loader interface for flow definitions
//!
//! The backing store, authoring UI, and caching strategy live outside
//! the engine. The loader result is treated as authoritative and
//! read-only for the duration of one execution.

use crate::domain::flow::{Flow, FlowId};
use crate::FlowError;
use async_trait::async_trait;

/// A flow definition as returned by the loader for one event name
#[derive(Debug, Clone, PartialEq)]
pub struct FlowBinding {
    /// ID of the flow
    pub id: FlowId,

    /// Human-readable name, used only for diagnostics and logging
    pub name: String,

    /// The flow tree itself
    pub payload: Flow,
}

/// Maps an event name to the ordered set of flows configured for it
#[async_trait]
pub trait FlowDefinitionLoader: Send + Sync {
    /// Load the flow definitions configured for the given event name
    ///
    /// The returned order is the execution order.
    async fn load(&self, event_name: &str) -> Result<Vec<FlowBinding>, FlowError>;
}

/// Memory implementations for testing
#[cfg(feature = "testing")]
pub mod memory {
    use super::*;
    use dashmap::DashMap;

    /// In-memory flow definition loader
    #[derive(Default)]
    pub struct MemoryFlowDefinitionLoader {
        bindings: DashMap<String, Vec<FlowBinding>>,
    }

    impl MemoryFlowDefinitionLoader {
        /// Create an empty loader
        pub fn new() -> Self {
            Self::default()
        }

        /// Register a flow for the given event name, appended in order
        pub fn register(&self, event_name: &str, binding: FlowBinding) {
            self.bindings
                .entry(event_name.to_string())
                .or_default()
                .push(binding);
        }
    }

    #[async_trait]
    impl FlowDefinitionLoader for MemoryFlowDefinitionLoader {
        async fn load(&self, event_name: &str) -> Result<Vec<FlowBinding>, FlowError> {
            Ok(self
                .bindings
                .get(event_name)
                .map(|bindings| bindings.clone())
                .unwrap_or_default())
        }
    }
}
