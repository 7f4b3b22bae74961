//! Rule evaluation interface
//!
//! The rule condition language and its scope building are a separate
//! subsystem; the engine only depends on the boolean contract below.

use crate::domain::flow::RuleId;
use crate::{DataPacket, FlowError};
use async_trait::async_trait;

/// Evaluates a rule against the scope built from the execution context
#[async_trait]
pub trait RuleEvaluator: Send + Sync {
    /// Whether the rule matches within the given scope
    ///
    /// An unknown rule evaluates to `false`.
    async fn evaluate(&self, rule_id: &RuleId, scope: &DataPacket) -> Result<bool, FlowError>;
}

/// Memory implementations for testing
#[cfg(feature = "testing")]
pub mod memory {
    use super::*;
    use dashmap::DashMap;

    /// In-memory rule evaluator backed by a fixed result table
    #[derive(Default)]
    pub struct MemoryRuleEvaluator {
        results: DashMap<RuleId, bool>,
    }

    impl MemoryRuleEvaluator {
        /// Create an evaluator with no known rules
        pub fn new() -> Self {
            Self::default()
        }

        /// Fix the result of a rule
        pub fn set_result(&self, rule_id: &str, matched: bool) {
            self.results.insert(RuleId(rule_id.to_string()), matched);
        }
    }

    #[async_trait]
    impl RuleEvaluator for MemoryRuleEvaluator {
        async fn evaluate(&self, rule_id: &RuleId, _scope: &DataPacket) -> Result<bool, FlowError> {
            Ok(self.results.get(rule_id).map(|entry| *entry).unwrap_or(false))
        }
    }
}
