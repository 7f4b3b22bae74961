use async_trait::async_trait;
use serde_json::{json, Value};
use storeflow_core::{DataPacket, FlowAction, FlowContext, FlowError};
use tracing::debug;

/// An action that collects tags for the triggering order
///
/// The tag ids are merged into the context store under the `tags` key;
/// the surrounding persistence layer applies them when the store is
/// flushed. Runs inside its own transaction.
pub struct AddTagAction {
    tags: Vec<String>,
    requirements: Vec<String>,
}

impl AddTagAction {
    /// Create an action that adds the given tags
    pub fn new(tags: Vec<String>) -> Self {
        Self {
            tags,
            requirements: vec!["order".to_string()],
        }
    }
}

#[async_trait]
impl FlowAction for AddTagAction {
    fn name(&self) -> &str {
        "add-tag"
    }

    fn requirements(&self) -> &[String] {
        &self.requirements
    }

    fn transactional(&self) -> bool {
        true
    }

    async fn handle(&self, context: &mut FlowContext) -> Result<(), FlowError> {
        let order = match context.data("order") {
            Some(order) => order.clone(),
            None => {
                return Err(FlowError::Other(
                    "add-tag requires order data on the context".to_string(),
                ))
            }
        };

        let order_id = match order.as_value().get("id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => {
                return Err(FlowError::Other(
                    "add-tag requires an order with an id".to_string(),
                ))
            }
        };

        let mut tags: Vec<Value> = context
            .store("tags")
            .and_then(|packet| packet.as_array().cloned())
            .unwrap_or_default();

        for tag in &self.tags {
            if !tags.iter().any(|existing| existing.as_str() == Some(tag)) {
                tags.push(json!(tag));
            }
        }

        debug!(order_id = %order_id, tags = tags.len(), "collected order tags");

        context.set_store("tags", DataPacket::new(Value::Array(tags)));
        context.set_store("tagged_order_id", DataPacket::from_string(&order_id));

        Ok(())
    }
}
