use crate::application::executor::{ExecutorConfig, FlowExecutor};
use crate::application::queue::FlowQueue;
use crate::domain::context::FlowContextFactory;
use crate::domain::events::BusinessEvent;
use crate::domain::loader::FlowDefinitionLoader;
use crate::FlowError;
use std::sync::Arc;
use tracing::{debug, error};

/// Drains the buffered flow queue at a lifecycle boundary
///
/// Runs on a single logical thread: events drain in enqueue order and
/// every flow of one event finishes before the next event starts.
/// Actions may re-emit events that get re-queued; the drain loop is
/// bounded so a cross-flow cycle cannot hang the host process.
pub struct BufferedFlowExecutor {
    queue: Arc<FlowQueue>,
    loader: Arc<dyn FlowDefinitionLoader>,
    context_factory: Arc<dyn FlowContextFactory>,
    executor: Arc<FlowExecutor>,
    config: ExecutorConfig,
}

impl BufferedFlowExecutor {
    /// Create a new buffered executor
    pub fn new(
        queue: Arc<FlowQueue>,
        loader: Arc<dyn FlowDefinitionLoader>,
        context_factory: Arc<dyn FlowContextFactory>,
        executor: Arc<FlowExecutor>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            queue,
            loader,
            context_factory,
            executor,
            config,
        }
    }

    /// Execute all buffered flows until the queue stays empty
    ///
    /// When the iteration bound is exceeded the drain stops with a
    /// single error log naming the pending event kinds; work already
    /// applied is kept and no error is raised for the overflow.
    pub async fn execute_buffered_flows(&self) -> Result<(), FlowError> {
        let mut iterations = 0usize;

        while !self.queue.is_empty() {
            if iterations >= self.config.max_drain_iterations {
                error!(
                    pending_events = ?self.queue.pending_event_names(),
                    max_iterations = self.config.max_drain_iterations,
                    "maximum buffered execution depth reached, stopping drain"
                );
                break;
            }
            iterations += 1;

            for event in self.queue.dequeue_flows() {
                self.execute_event(event).await?;
            }
        }

        Ok(())
    }

    async fn execute_event(&self, event: Arc<dyn BusinessEvent>) -> Result<(), FlowError> {
        let mut context = match self.context_factory.create(event.clone()).await {
            Ok(context) => context,
            Err(err) => {
                error!(
                    event = %event.name(),
                    error_code = err.code(),
                    error = %err,
                    "failed to build flow context, event consumed"
                );
                return Ok(());
            }
        };

        let definitions = match self.loader.load(event.name()).await {
            Ok(definitions) => definitions,
            Err(err) => {
                error!(
                    event = %event.name(),
                    error_code = err.code(),
                    error = %err,
                    "failed to load flow definitions, event consumed"
                );
                return Ok(());
            }
        };

        if definitions.is_empty() {
            return Ok(());
        }

        debug!(
            event = %event.name(),
            flows = definitions.len(),
            "executing buffered flows"
        );

        self.executor.execute_flows(&definitions, &mut context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::executor::NoopHooks;
    use crate::application::registry::FlowActionRegistry;
    use crate::application::transaction::memory::MemoryTransactionManager;
    use crate::domain::context::{DefaultContextFactory, FlowContext};
    use crate::domain::events::memory::{MemoryAppActionSource, MemoryEventBus, StaticEvent};
    use crate::domain::flow::{ActionSequence, Flow, FlowId, Sequence, SequenceId};
    use crate::domain::loader::memory::MemoryFlowDefinitionLoader;
    use crate::domain::loader::FlowBinding;
    use crate::domain::rules::memory::MemoryRuleEvaluator;
    use crate::{FlowAction, FlowError};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAction {
        invocations: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl FlowAction for CountingAction {
        fn name(&self) -> &str {
            "counting-action"
        }

        async fn handle(&self, _context: &mut FlowContext) -> Result<(), FlowError> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn executor_over(
        queue: Arc<FlowQueue>,
        loader: Arc<MemoryFlowDefinitionLoader>,
        registry: FlowActionRegistry,
    ) -> BufferedFlowExecutor {
        let config = ExecutorConfig::default();
        let flow_executor = Arc::new(FlowExecutor::new(
            Arc::new(registry),
            Arc::new(MemoryRuleEvaluator::new()),
            Arc::new(MemoryTransactionManager::new()),
            Arc::new(MemoryAppActionSource::new()),
            Arc::new(MemoryEventBus::new()),
            Arc::new(NoopHooks),
            config.clone(),
        ));

        BufferedFlowExecutor::new(
            queue,
            loader,
            Arc::new(DefaultContextFactory),
            flow_executor,
            config,
        )
    }

    fn simple_binding(flow_id: &str, action: &str) -> FlowBinding {
        FlowBinding {
            id: FlowId(flow_id.to_string()),
            name: format!("{} flow", flow_id),
            payload: Flow::new(
                FlowId(flow_id.to_string()),
                vec![Sequence::Action(ActionSequence {
                    sequence_id: SequenceId("seq-1".to_string()),
                    action: action.to_string(),
                    app_action_id: None,
                })],
            ),
        }
    }

    #[tokio::test]
    async fn test_events_without_definitions_are_consumed() {
        let queue = Arc::new(FlowQueue::new());
        queue.queue_flow(Arc::new(StaticEvent::new("unconfigured.event", json!({}))));

        let executor = executor_over(
            queue.clone(),
            Arc::new(MemoryFlowDefinitionLoader::new()),
            FlowActionRegistry::new(),
        );

        executor.execute_buffered_flows().await.unwrap();
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_buffered_events_execute_their_flows() {
        let queue = Arc::new(FlowQueue::new());
        queue.queue_flow(Arc::new(StaticEvent::new(
            "checkout.order.placed",
            json!({"orderId": "order-1"}),
        )));
        queue.queue_flow(Arc::new(StaticEvent::new(
            "checkout.order.placed",
            json!({"orderId": "order-2"}),
        )));

        let loader = Arc::new(MemoryFlowDefinitionLoader::new());
        loader.register(
            "checkout.order.placed",
            simple_binding("flow-1", "counting-action"),
        );

        let invocations = Arc::new(AtomicUsize::new(0));
        let registry = FlowActionRegistry::new().with_action(Arc::new(CountingAction {
            invocations: invocations.clone(),
        }));

        let executor = executor_over(queue.clone(), loader, registry);
        executor.execute_buffered_flows().await.unwrap();

        assert_eq!(invocations.load(Ordering::SeqCst), 2);
        assert!(queue.is_empty());
    }
}
