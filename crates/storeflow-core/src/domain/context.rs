use crate::domain::events::BusinessEvent;
use crate::domain::flow::{FlowId, SequenceId};
use crate::{DataPacket, FlowError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Immutable contextual identity an event was raised under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventScope {
    /// Tenant the event belongs to
    pub tenant_id: String,

    /// Locale active when the event was raised
    pub locale: Option<String>,

    /// Permissions granted to the originating unit of work
    pub permissions: Vec<String>,

    /// Marker set by callers that already know no flow should run
    pub skip_flows: bool,
}

impl EventScope {
    /// Create a scope for the given tenant with no extra permissions
    pub fn new(tenant_id: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            locale: None,
            permissions: Vec::new(),
            skip_flows: false,
        }
    }

    /// Return a copy of this scope with the skip marker set
    pub fn skipping_flows(mut self) -> Self {
        self.skip_flows = true;
        self
    }
}

type Producer = Box<dyn FnOnce() -> DataPacket + Send + Sync>;

/// A data slot that is either an eager value or a once-invoked producer
///
/// The producer runs on first read and its result is cached for the
/// remainder of the execution.
pub struct LazyValue {
    value: Option<DataPacket>,
    producer: Option<Producer>,
}

impl LazyValue {
    /// Create a slot holding an already computed value
    pub fn ready(value: DataPacket) -> Self {
        Self {
            value: Some(value),
            producer: None,
        }
    }

    /// Create a slot that computes its value on first read
    pub fn deferred<F>(producer: F) -> Self
    where
        F: FnOnce() -> DataPacket + Send + Sync + 'static,
    {
        Self {
            value: None,
            producer: Some(Box::new(producer)),
        }
    }

    /// Resolve the slot, invoking the producer at most once
    pub fn get(&mut self) -> &DataPacket {
        let producer = &mut self.producer;
        self.value.get_or_insert_with(|| match producer.take() {
            Some(produce) => produce(),
            None => DataPacket::null(),
        })
    }

    /// The value if it has already been resolved
    pub fn peek(&self) -> Option<&DataPacket> {
        self.value.as_ref()
    }
}

impl fmt::Debug for LazyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => f.debug_tuple("LazyValue").field(value).finish(),
            None => f.write_str("LazyValue(<deferred>)"),
        }
    }
}

/// Per-flow execution state, initialized by the executor
#[derive(Debug, Clone, PartialEq)]
pub struct FlowState {
    /// The flow currently being walked
    pub flow_id: FlowId,

    /// Pointer to the sequence currently being executed
    pub sequence_id: Option<SequenceId>,

    /// Set when an action requested the flow to stop
    pub stopped: bool,
}

/// The mutable record that travels through one flow-batch execution
///
/// One context is created per dispatched event and discarded after the
/// batch completes; it is never shared or reused across events.
#[derive(Debug)]
pub struct FlowContext {
    id: Uuid,
    event_name: String,
    scope: EventScope,
    store: HashMap<String, DataPacket>,
    data: HashMap<String, LazyValue>,
    state: Option<FlowState>,
}

impl FlowContext {
    /// Create a fresh context for one event
    pub fn new(event_name: &str, scope: EventScope) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_name: event_name.to_string(),
            scope,
            store: HashMap::new(),
            data: HashMap::new(),
            state: None,
        }
    }

    /// Unique identifier of this execution
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Name of the event that produced this context
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// The contextual identity the event was raised under
    pub fn scope(&self) -> &EventScope {
        &self.scope
    }

    /// Record persisted intent under the given key
    pub fn set_store(&mut self, key: &str, value: DataPacket) {
        self.store.insert(key.to_string(), value);
    }

    /// Read persisted intent recorded under the given key
    pub fn store(&self, key: &str) -> Option<&DataPacket> {
        self.store.get(key)
    }

    /// Register an eagerly computed data value
    pub fn set_data(&mut self, key: &str, value: DataPacket) {
        self.data.insert(key.to_string(), LazyValue::ready(value));
    }

    /// Register a deferred data value, evaluated and cached on first read
    pub fn set_deferred<F>(&mut self, key: &str, producer: F)
    where
        F: FnOnce() -> DataPacket + Send + Sync + 'static,
    {
        self.data.insert(key.to_string(), LazyValue::deferred(producer));
    }

    /// Read a data value, resolving a deferred producer if necessary
    pub fn data(&mut self, key: &str) -> Option<&DataPacket> {
        self.data.get_mut(key).map(|slot| &*slot.get())
    }

    /// Force resolution of a data key without using the value
    pub fn resolve(&mut self, key: &str) {
        if let Some(slot) = self.data.get_mut(key) {
            slot.get();
        }
    }

    /// The current flow state
    ///
    /// Fails with [`FlowError::StateNotReady`] if no flow execution has
    /// been started on this context yet.
    pub fn state(&self) -> Result<&FlowState, FlowError> {
        self.state.as_ref().ok_or(FlowError::StateNotReady)
    }

    /// Begin walking the given flow; resets the per-flow state
    pub fn begin_flow(&mut self, flow_id: FlowId) {
        self.state = Some(FlowState {
            flow_id,
            sequence_id: None,
            stopped: false,
        });
    }

    /// Record the sequence the executor is about to run
    pub fn set_current_sequence(&mut self, sequence_id: SequenceId) -> Result<(), FlowError> {
        match &mut self.state {
            Some(state) => {
                state.sequence_id = Some(sequence_id);
                Ok(())
            }
            None => Err(FlowError::StateNotReady),
        }
    }

    /// Request that the remaining sequences of the current flow are skipped
    pub fn stop(&mut self) -> Result<(), FlowError> {
        match &mut self.state {
            Some(state) => {
                state.stopped = true;
                Ok(())
            }
            None => Err(FlowError::StateNotReady),
        }
    }

    /// Whether the current flow has been stopped
    pub fn is_stopped(&self) -> bool {
        self.state.as_ref().map_or(false, |state| state.stopped)
    }

    /// Build the scope handed to the rule evaluator
    ///
    /// Only data values that have already been resolved are included;
    /// branching never forces a deferred producer.
    pub fn rule_scope(&self) -> DataPacket {
        let mut data = serde_json::Map::new();
        for (key, slot) in &self.data {
            if let Some(value) = slot.peek() {
                data.insert(key.clone(), value.as_value().clone());
            }
        }

        let mut store = serde_json::Map::new();
        for (key, value) in &self.store {
            store.insert(key.clone(), value.as_value().clone());
        }

        DataPacket::new(json!({
            "event": self.event_name,
            "tenant": self.scope.tenant_id,
            "data": data,
            "store": store,
        }))
    }
}

/// Builds execution contexts from incoming events
///
/// Implementations know how to project event-specific domain objects
/// into the generic `data`/`store` maps.
#[async_trait]
pub trait FlowContextFactory: Send + Sync {
    /// Create the context for one event
    async fn create(&self, event: Arc<dyn BusinessEvent>) -> Result<FlowContext, FlowError>;
}

/// Default factory that exposes the event payload under the `event` data key
pub struct DefaultContextFactory;

#[async_trait]
impl FlowContextFactory for DefaultContextFactory {
    async fn create(&self, event: Arc<dyn BusinessEvent>) -> Result<FlowContext, FlowError> {
        let mut context = FlowContext::new(event.name(), event.scope().clone());
        context.set_data("event", event.data());
        if let Some(payload) = event.flow_payload() {
            context.set_data("flow", payload);
        }
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_deferred_value_is_resolved_once_and_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut context = FlowContext::new("checkout.order.placed", EventScope::new("tenant-1"));
        context.set_deferred("order", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            DataPacket::new(json!({"id": "order-1"}))
        });

        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let first = context.data("order").unwrap().clone();
        let second = context.data("order").unwrap().clone();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_state_access_before_initialization_fails() {
        let mut context = FlowContext::new("checkout.order.placed", EventScope::new("tenant-1"));

        assert_eq!(context.state().unwrap_err(), FlowError::StateNotReady);
        assert_eq!(context.stop().unwrap_err(), FlowError::StateNotReady);
        assert!(!context.is_stopped());
    }

    #[test]
    fn test_stop_after_begin_flow() {
        let mut context = FlowContext::new("checkout.order.placed", EventScope::new("tenant-1"));
        context.begin_flow(FlowId("order-flow".to_string()));

        assert!(!context.is_stopped());
        context.stop().unwrap();
        assert!(context.is_stopped());

        let state = context.state().unwrap();
        assert_eq!(state.flow_id, FlowId("order-flow".to_string()));
    }

    #[test]
    fn test_begin_flow_resets_state_between_flows() {
        let mut context = FlowContext::new("checkout.order.placed", EventScope::new("tenant-1"));

        context.begin_flow(FlowId("flow-a".to_string()));
        context
            .set_current_sequence(SequenceId("seq-1".to_string()))
            .unwrap();
        context.stop().unwrap();

        context.begin_flow(FlowId("flow-b".to_string()));
        let state = context.state().unwrap();
        assert_eq!(state.flow_id, FlowId("flow-b".to_string()));
        assert_eq!(state.sequence_id, None);
        assert!(!state.stopped);
    }

    #[test]
    fn test_rule_scope_contains_only_resolved_data() {
        let mut context = FlowContext::new("checkout.order.placed", EventScope::new("tenant-1"));
        context.set_data("customer", DataPacket::new(json!({"id": "customer-1"})));
        context.set_deferred("order", || DataPacket::new(json!({"id": "order-1"})));
        context.set_store("tags", DataPacket::new(json!(["vip"])));

        let scope = context.rule_scope();
        let value = scope.as_value();

        assert_eq!(value["event"], "checkout.order.placed");
        assert_eq!(value["data"]["customer"]["id"], "customer-1");
        assert!(value["data"].get("order").is_none());
        assert_eq!(value["store"]["tags"][0], "vip");
    }
}
