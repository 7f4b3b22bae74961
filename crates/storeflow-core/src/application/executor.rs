use crate::application::registry::FlowActionRegistry;
use crate::application::transaction::{run_transactional, TransactionManager};
use crate::domain::context::FlowContext;
use crate::domain::events::{AppActionEvent, AppActionSource, EventBus};
use crate::domain::flow::{ActionSequence, Flow, IfSequence, Sequence, SequenceId};
use crate::domain::loader::FlowBinding;
use crate::domain::rules::RuleEvaluator;
use crate::FlowError;
use async_trait::async_trait;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, error};

/// Default upper bound on buffered drain iterations
pub const DEFAULT_MAX_DRAIN_ITERATIONS: usize = 10;

/// Tunables for flow execution
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Upper bound on drain iterations of the buffered executor
    pub max_drain_iterations: usize,

    /// Whether the database supports nested transaction savepoints
    ///
    /// When `false`, transaction failures propagate to the dispatching
    /// caller instead of being isolated per flow. This compatibility
    /// behavior is intentional and must stay configurable.
    pub nested_transactions: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_drain_iterations: DEFAULT_MAX_DRAIN_ITERATIONS,
            nested_transactions: true,
        }
    }
}

/// Extension points around a single flow execution
///
/// The before hook may substitute or augment the root sequence list;
/// returning `None` keeps the loaded list.
#[async_trait]
pub trait ExecutionHooks: Send + Sync {
    /// Called before the root sequences are walked
    async fn before_execute(
        &self,
        _flow: &Flow,
        _context: &mut FlowContext,
    ) -> Result<Option<Vec<Sequence>>, FlowError> {
        Ok(None)
    }

    /// Called after the walk finished, stopped or not
    async fn after_execute(
        &self,
        _flow: &Flow,
        _context: &mut FlowContext,
    ) -> Result<(), FlowError> {
        Ok(())
    }
}

/// Hooks implementation that leaves every flow untouched
pub struct NoopHooks;

#[async_trait]
impl ExecutionHooks for NoopHooks {}

/// The core flow interpreter
///
/// Walks one flow's sequence tree depth-first against an execution
/// context, invoking registered actions and evaluating rule branches.
/// Failures are isolated per flow: one failing definition never stops
/// its siblings.
pub struct FlowExecutor {
    registry: Arc<FlowActionRegistry>,
    rules: Arc<dyn RuleEvaluator>,
    transactions: Arc<dyn TransactionManager>,
    app_actions: Arc<dyn AppActionSource>,
    bus: Arc<dyn EventBus>,
    hooks: Arc<dyn ExecutionHooks>,
    config: ExecutorConfig,
}

impl FlowExecutor {
    /// Create a new flow executor
    pub fn new(
        registry: Arc<FlowActionRegistry>,
        rules: Arc<dyn RuleEvaluator>,
        transactions: Arc<dyn TransactionManager>,
        app_actions: Arc<dyn AppActionSource>,
        bus: Arc<dyn EventBus>,
        hooks: Arc<dyn ExecutionHooks>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            registry,
            rules,
            transactions,
            app_actions,
            bus,
            hooks,
            config,
        }
    }

    /// Execute every definition loaded for one event, in loader order
    ///
    /// A failing flow is logged with its coordinates and the remaining
    /// definitions still execute. The single exception is the
    /// no-savepoint compatibility mode, under which transaction
    /// failures are re-thrown to the caller.
    pub async fn execute_flows(
        &self,
        definitions: &[FlowBinding],
        context: &mut FlowContext,
    ) -> Result<(), FlowError> {
        for binding in definitions {
            if let Err(err) = self.execute(binding, context).await {
                let sequence_id = match &err {
                    FlowError::SequenceExecution { sequence_id, .. } => Some(sequence_id.clone()),
                    _ => context.state().ok().and_then(|state| state.sequence_id.clone()),
                };

                error!(
                    flow_id = %binding.id,
                    flow_name = %binding.name,
                    sequence_id = ?sequence_id,
                    error_code = err.code(),
                    error = %err,
                    "flow execution failed"
                );

                if !self.config.nested_transactions && err.is_transaction_failure() {
                    return Err(err);
                }
            }
        }

        Ok(())
    }

    /// Execute a single flow against the context
    pub async fn execute(
        &self,
        binding: &FlowBinding,
        context: &mut FlowContext,
    ) -> Result<(), FlowError> {
        context.begin_flow(binding.id.clone());

        binding
            .payload
            .validate()
            .map_err(|err| self.flow_error(binding, err))?;

        let substituted = self
            .hooks
            .before_execute(&binding.payload, context)
            .await
            .map_err(|err| self.flow_error(binding, err))?;

        let roots: Cow<'_, [Sequence]> = match substituted {
            Some(sequences) => Cow::Owned(sequences),
            None => Cow::Borrowed(binding.payload.sequences.as_slice()),
        };

        // Depth-first walk in document order. A stop request clears the
        // whole remaining stack, not just the current level.
        let mut stack: Vec<&Sequence> = roots.iter().rev().collect();
        while let Some(node) = stack.pop() {
            if let Some(branch) = self.execute_sequence(node, binding, context).await? {
                for child in branch.iter().rev() {
                    stack.push(child);
                }
            }

            if context.is_stopped() {
                debug!(flow_id = %binding.id, "flow stopped by action");
                break;
            }
        }

        self.hooks
            .after_execute(&binding.payload, context)
            .await
            .map_err(|err| self.flow_error(binding, err))?;

        Ok(())
    }

    /// Execute one sequence node, returning the subtree to walk next
    async fn execute_sequence<'a>(
        &self,
        node: &'a Sequence,
        binding: &FlowBinding,
        context: &mut FlowContext,
    ) -> Result<Option<&'a [Sequence]>, FlowError> {
        context
            .set_current_sequence(node.sequence_id().clone())
            .map_err(|err| self.sequence_error(binding, node.sequence_id(), err))?;

        match node {
            Sequence::Action(action) => {
                self.execute_action(action, context)
                    .await
                    .map_err(|err| self.sequence_error(binding, &action.sequence_id, err))?;
                Ok(None)
            }
            Sequence::If(branch) => self
                .execute_if(branch, context)
                .await
                .map_err(|err| self.sequence_error(binding, &branch.sequence_id, err)),
        }
    }

    async fn execute_action(
        &self,
        sequence: &ActionSequence,
        context: &mut FlowContext,
    ) -> Result<(), FlowError> {
        debug!(
            action = %sequence.action,
            sequence_id = %sequence.sequence_id,
            "executing action"
        );

        if let Some(app_action_id) = &sequence.app_action_id {
            // The effect is performed out of process; only the webhook
            // payload is fetched and delegated here.
            let fetched = self.app_actions.fetch(app_action_id, context).await?;
            let event = AppActionEvent::new(&sequence.action, fetched, context.scope().clone());
            self.bus.publish(Arc::new(event)).await?;
            return Ok(());
        }

        let handler = self
            .registry
            .get(&sequence.action)
            .ok_or_else(|| FlowError::ActionNotFound(sequence.action.clone()))?;

        for key in handler.requirements() {
            context.resolve(key);
        }

        if handler.transactional() {
            run_transactional(self.transactions.as_ref(), handler.as_ref(), context).await
        } else {
            handler.handle(context).await
        }
    }

    async fn execute_if<'a>(
        &self,
        branch: &'a IfSequence,
        context: &mut FlowContext,
    ) -> Result<Option<&'a [Sequence]>, FlowError> {
        let scope = context.rule_scope();
        let matched = self.rules.evaluate(&branch.rule_id, &scope).await?;

        debug!(rule_id = %branch.rule_id, matched, "rule evaluated");

        let chosen = if matched {
            &branch.true_branch
        } else {
            &branch.false_branch
        };

        if chosen.is_empty() {
            Ok(None)
        } else {
            Ok(Some(chosen.as_slice()))
        }
    }

    fn sequence_error(
        &self,
        binding: &FlowBinding,
        sequence_id: &SequenceId,
        err: FlowError,
    ) -> FlowError {
        // Transaction kinds stay distinguishable for the caller.
        if err.is_transaction_failure() {
            return err;
        }

        FlowError::SequenceExecution {
            flow_id: binding.id.clone(),
            sequence_id: sequence_id.clone(),
            message: err.to_string(),
        }
    }

    fn flow_error(&self, binding: &FlowBinding, err: FlowError) -> FlowError {
        if err.is_transaction_failure() {
            return err;
        }

        FlowError::FlowExecution {
            flow_id: binding.id.clone(),
            message: err.to_string(),
        }
    }
}
