use crate::domain::context::EventScope;
use crate::{DataPacket, FlowError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// A domain event raised by the surrounding business logic
///
/// Events are dispatched through the [`EventBus`] and, when their kind
/// is capable of carrying flow-relevant data, buffered for deferred
/// flow execution.
pub trait BusinessEvent: Debug + Send + Sync {
    /// The event name flows are keyed on
    fn name(&self) -> &str;

    /// The contextual identity the event was raised under
    fn scope(&self) -> &EventScope;

    /// The domain payload of the event
    fn data(&self) -> DataPacket;

    /// The flow-relevant projection of this event
    ///
    /// Returns `None` for event kinds that cannot participate in flow
    /// execution; those are delivered to the bus but never buffered.
    fn flow_payload(&self) -> Option<DataPacket> {
        None
    }
}

/// General-purpose event bus the engine forwards every event to
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Deliver the event to all subscribed consumers
    async fn publish(&self, event: Arc<dyn BusinessEvent>) -> Result<(), FlowError>;
}

/// Diagnostic event published after flow dispatch for audit purposes
///
/// Wraps the original event; never flow-capable itself.
#[derive(Debug)]
pub struct FlowLogEvent {
    /// Name of the wrapped event
    pub original_name: String,

    /// Payload of the wrapped event
    pub payload: DataPacket,

    /// Scope of the wrapped event
    pub scope: EventScope,

    /// When the dispatch was observed
    pub timestamp: DateTime<Utc>,
}

impl FlowLogEvent {
    /// Event name the log event is published under
    pub const NAME: &'static str = "flow.log";

    /// Wrap the given event
    pub fn new(event: &dyn BusinessEvent) -> Self {
        Self {
            original_name: event.name().to_string(),
            payload: event.data(),
            scope: event.scope().clone(),
            timestamp: Utc::now(),
        }
    }
}

impl BusinessEvent for FlowLogEvent {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn scope(&self) -> &EventScope {
        &self.scope
    }

    fn data(&self) -> DataPacket {
        DataPacket::singleton("original_event", self.original_name.clone().into())
    }
}

/// Payload and headers fetched for an externally provided app action
#[derive(Debug, Clone, PartialEq)]
pub struct AppActionPayload {
    /// Webhook body to hand to the out-of-process handler
    pub payload: DataPacket,

    /// Webhook headers to hand to the out-of-process handler
    pub headers: HashMap<String, String>,
}

/// Generic event carrying an app action to an out-of-process handler
#[derive(Debug)]
pub struct AppActionEvent {
    /// Name of the action being delegated
    pub action: String,

    /// Fetched webhook payload
    pub payload: DataPacket,

    /// Fetched webhook headers
    pub headers: HashMap<String, String>,

    /// Scope of the triggering execution
    pub scope: EventScope,

    /// When the action was delegated
    pub timestamp: DateTime<Utc>,
}

impl AppActionEvent {
    /// Event name app action events are published under
    pub const NAME: &'static str = "flow.app_action";

    /// Create an app action event from a fetched payload
    pub fn new(action: &str, fetched: AppActionPayload, scope: EventScope) -> Self {
        Self {
            action: action.to_string(),
            payload: fetched.payload,
            headers: fetched.headers,
            scope,
            timestamp: Utc::now(),
        }
    }
}

impl BusinessEvent for AppActionEvent {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn scope(&self) -> &EventScope {
        &self.scope
    }

    fn data(&self) -> DataPacket {
        self.payload.clone()
    }
}

/// Supplies webhook payloads for externally provided app actions
#[async_trait]
pub trait AppActionSource: Send + Sync {
    /// Fetch the payload and headers configured for the given app action
    async fn fetch(
        &self,
        app_action_id: &str,
        context: &crate::domain::context::FlowContext,
    ) -> Result<AppActionPayload, FlowError>;
}

/// Memory implementations for testing
#[cfg(feature = "testing")]
pub mod memory {
    use super::*;
    use crate::domain::context::FlowContext;
    use dashmap::DashMap;
    use tokio::sync::Mutex;

    /// In-memory event bus that records every published event
    #[derive(Default)]
    pub struct MemoryEventBus {
        published: Mutex<Vec<Arc<dyn BusinessEvent>>>,
    }

    impl MemoryEventBus {
        /// Create an empty bus
        pub fn new() -> Self {
            Self::default()
        }

        /// All events published so far, in order
        pub async fn published(&self) -> Vec<Arc<dyn BusinessEvent>> {
            self.published.lock().await.clone()
        }

        /// Names of all events published so far, in order
        pub async fn published_names(&self) -> Vec<String> {
            self.published
                .lock()
                .await
                .iter()
                .map(|event| event.name().to_string())
                .collect()
        }
    }

    #[async_trait]
    impl EventBus for MemoryEventBus {
        async fn publish(&self, event: Arc<dyn BusinessEvent>) -> Result<(), FlowError> {
            self.published.lock().await.push(event);
            Ok(())
        }
    }

    /// In-memory app action source backed by a fixed payload table
    #[derive(Default)]
    pub struct MemoryAppActionSource {
        payloads: DashMap<String, AppActionPayload>,
    }

    impl MemoryAppActionSource {
        /// Create a source with no registered app actions
        pub fn new() -> Self {
            Self::default()
        }

        /// Register the payload returned for an app action id
        pub fn register(&self, app_action_id: &str, payload: AppActionPayload) {
            self.payloads.insert(app_action_id.to_string(), payload);
        }
    }

    #[async_trait]
    impl AppActionSource for MemoryAppActionSource {
        async fn fetch(
            &self,
            app_action_id: &str,
            _context: &FlowContext,
        ) -> Result<AppActionPayload, FlowError> {
            self.payloads
                .get(app_action_id)
                .map(|entry| entry.clone())
                .ok_or_else(|| {
                    FlowError::AppAction(format!("unknown app action: {}", app_action_id))
                })
        }
    }

    /// A fixed test event with a configurable flow payload
    #[derive(Debug, Clone)]
    pub struct StaticEvent {
        name: String,
        scope: EventScope,
        payload: serde_json::Value,
        flow_capable: bool,
    }

    impl StaticEvent {
        /// Create a flow-capable event
        pub fn new(name: &str, payload: serde_json::Value) -> Self {
            Self {
                name: name.to_string(),
                scope: EventScope::new("tenant-test"),
                payload,
                flow_capable: true,
            }
        }

        /// Create an event whose kind cannot carry flow data
        pub fn plain(name: &str, payload: serde_json::Value) -> Self {
            Self {
                flow_capable: false,
                ..Self::new(name, payload)
            }
        }

        /// Replace the scope of this event
        pub fn with_scope(mut self, scope: EventScope) -> Self {
            self.scope = scope;
            self
        }
    }

    impl BusinessEvent for StaticEvent {
        fn name(&self) -> &str {
            &self.name
        }

        fn scope(&self) -> &EventScope {
            &self.scope
        }

        fn data(&self) -> DataPacket {
            DataPacket::new(self.payload.clone())
        }

        fn flow_payload(&self) -> Option<DataPacket> {
            if self.flow_capable {
                Some(DataPacket::new(self.payload.clone()))
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::{MemoryEventBus, StaticEvent};
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flow_log_event_wraps_the_original() {
        let event = StaticEvent::new("checkout.order.placed", json!({"orderId": "order-1"}));
        let log_event = FlowLogEvent::new(&event);

        assert_eq!(log_event.name(), FlowLogEvent::NAME);
        assert_eq!(log_event.original_name, "checkout.order.placed");
        assert!(log_event.flow_payload().is_none());
    }

    #[test]
    fn test_app_action_event_carries_payload_and_headers() {
        let fetched = AppActionPayload {
            payload: DataPacket::new(json!({"orderId": "order-1"})),
            headers: HashMap::from([("x-signature".to_string(), "abc".to_string())]),
        };

        let event = AppActionEvent::new("slack-message", fetched, EventScope::new("tenant-1"));

        assert_eq!(event.name(), AppActionEvent::NAME);
        assert_eq!(event.action, "slack-message");
        assert_eq!(event.headers.get("x-signature").unwrap(), "abc");
        assert!(event.flow_payload().is_none());
    }

    #[tokio::test]
    async fn test_memory_bus_records_in_order() {
        let bus = MemoryEventBus::new();

        bus.publish(Arc::new(StaticEvent::new("first", json!({}))))
            .await
            .unwrap();
        bus.publish(Arc::new(StaticEvent::new("second", json!({}))))
            .await
            .unwrap();

        assert_eq!(bus.published_names().await, vec!["first", "second"]);
    }
}
