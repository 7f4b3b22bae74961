use crate::FlowError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Value object: Flow ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowId(pub String);

/// Value object: Sequence ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceId(pub String);

/// Value object: Rule ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleId(pub String);

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Represents a parsed and validated flow loaded from the authoring surface
///
/// A flow is immutable once loaded. The executor walks its sequences
/// in list order and never mutates the tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Flow {
    /// ID of the flow
    pub id: FlowId,

    /// The root-level sequences of this flow, in execution order
    pub sequences: Vec<Sequence>,
}

/// One node in a flow's tree
///
/// The set of node kinds is fixed; the walker matches exhaustively.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Sequence {
    /// An executable action
    Action(ActionSequence),

    /// A rule-based branch
    If(IfSequence),
}

impl Sequence {
    /// The ID of this sequence node
    pub fn sequence_id(&self) -> &SequenceId {
        match self {
            Sequence::Action(action) => &action.sequence_id,
            Sequence::If(branch) => &branch.sequence_id,
        }
    }
}

/// A sequence node that executes a named action
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionSequence {
    /// ID of the sequence node
    pub sequence_id: SequenceId,

    /// Name of the action to execute
    pub action: String,

    /// Externally provided app action to dispatch instead of a local handler
    #[serde(default)]
    pub app_action_id: Option<String>,
}

/// A sequence node that forks on a rule evaluation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IfSequence {
    /// ID of the sequence node
    pub sequence_id: SequenceId,

    /// Rule evaluated against the execution context
    pub rule_id: RuleId,

    /// Subtree walked when the rule matches; empty means "do nothing"
    #[serde(default)]
    pub true_branch: Vec<Sequence>,

    /// Subtree walked when the rule does not match; empty means "do nothing"
    #[serde(default)]
    pub false_branch: Vec<Sequence>,
}

impl Flow {
    /// Create a new flow from its root sequences
    pub fn new(id: FlowId, sequences: Vec<Sequence>) -> Self {
        Self { id, sequences }
    }

    /// Validate the flow structure
    pub fn validate(&self) -> Result<(), FlowError> {
        let mut seen = HashSet::new();
        Self::check_unique_ids(&self.sequences, &mut seen)
    }

    fn check_unique_ids<'a>(
        sequences: &'a [Sequence],
        seen: &mut HashSet<&'a SequenceId>,
    ) -> Result<(), FlowError> {
        for sequence in sequences {
            if !seen.insert(sequence.sequence_id()) {
                return Err(FlowError::Validation(format!(
                    "duplicate sequence ID: {}",
                    sequence.sequence_id()
                )));
            }

            if let Sequence::If(branch) = sequence {
                Self::check_unique_ids(&branch.true_branch, seen)?;
                Self::check_unique_ids(&branch.false_branch, seen)?;
            }
        }

        Ok(())
    }
}
