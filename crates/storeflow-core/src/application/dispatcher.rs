use crate::application::queue::FlowQueue;
use crate::domain::events::{BusinessEvent, EventBus, FlowLogEvent};
use crate::FlowError;
use std::sync::Arc;
use tracing::{debug, warn};

/// Entry point for domain events
///
/// Flows are additive: every event is delivered to the general event
/// bus first, and nothing in the flow stage may prevent that delivery.
/// Flow-capable events are buffered for deferred execution unless the
/// scope carries the skip marker.
pub struct FlowDispatcher {
    bus: Arc<dyn EventBus>,
    queue: Arc<FlowQueue>,
}

impl FlowDispatcher {
    /// Create a dispatcher over the given bus and queue
    pub fn new(bus: Arc<dyn EventBus>, queue: Arc<FlowQueue>) -> Self {
        Self { bus, queue }
    }

    /// Dispatch one domain event
    pub async fn dispatch(&self, event: Arc<dyn BusinessEvent>) -> Result<(), FlowError> {
        self.bus.publish(event.clone()).await?;

        if event.scope().skip_flows {
            debug!(event = %event.name(), "flow processing skipped by marker");
        } else if event.flow_payload().is_some() {
            self.queue.queue_flow(event.clone());
            debug!(event = %event.name(), "event buffered for flow execution");
        }

        let log_event = Arc::new(FlowLogEvent::new(event.as_ref()));
        if let Err(err) = self.bus.publish(log_event).await {
            warn!(
                event = %event.name(),
                error_code = err.code(),
                error = %err,
                "flow log event delivery failed"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::context::EventScope;
    use crate::domain::events::memory::{MemoryEventBus, StaticEvent};
    use serde_json::json;

    fn dispatcher() -> (FlowDispatcher, Arc<MemoryEventBus>, Arc<FlowQueue>) {
        let bus = Arc::new(MemoryEventBus::new());
        let queue = Arc::new(FlowQueue::new());
        let dispatcher = FlowDispatcher::new(bus.clone(), queue.clone());
        (dispatcher, bus, queue)
    }

    #[tokio::test]
    async fn test_event_reaches_bus_and_queue_and_log() {
        let (dispatcher, bus, queue) = dispatcher();

        let event = Arc::new(StaticEvent::new(
            "checkout.order.placed",
            json!({"orderId": "order-1"}),
        ));
        dispatcher.dispatch(event).await.unwrap();

        assert_eq!(
            bus.published_names().await,
            vec!["checkout.order.placed", FlowLogEvent::NAME]
        );
        assert_eq!(
            queue.pending_event_names(),
            vec!["checkout.order.placed".to_string()]
        );
    }

    #[tokio::test]
    async fn test_skip_marker_bypasses_buffering() {
        let (dispatcher, bus, queue) = dispatcher();

        let event = Arc::new(
            StaticEvent::new("checkout.order.placed", json!({}))
                .with_scope(EventScope::new("tenant-1").skipping_flows()),
        );
        dispatcher.dispatch(event).await.unwrap();

        assert!(queue.is_empty());
        // Bus delivery and the diagnostic log event still happen.
        assert_eq!(
            bus.published_names().await,
            vec!["checkout.order.placed", FlowLogEvent::NAME]
        );
    }

    #[tokio::test]
    async fn test_non_flow_capable_event_is_not_buffered() {
        let (dispatcher, bus, queue) = dispatcher();

        let event = Arc::new(StaticEvent::plain("cache.invalidated", json!({})));
        dispatcher.dispatch(event).await.unwrap();

        assert!(queue.is_empty());
        assert_eq!(
            bus.published_names().await,
            vec!["cache.invalidated", FlowLogEvent::NAME]
        );
    }
}
