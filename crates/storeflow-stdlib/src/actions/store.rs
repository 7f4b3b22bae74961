use async_trait::async_trait;
use storeflow_core::{FlowAction, FlowContext, FlowError};

/// An action that copies a resolved data value into the persisted store
pub struct SetStoreValueAction {
    source: String,
    target: String,
    requirements: Vec<String>,
}

impl SetStoreValueAction {
    /// Copy the `source` data key into the `target` store key
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            requirements: vec![source.to_string()],
        }
    }
}

#[async_trait]
impl FlowAction for SetStoreValueAction {
    fn name(&self) -> &str {
        "set-store-value"
    }

    fn requirements(&self) -> &[String] {
        &self.requirements
    }

    async fn handle(&self, context: &mut FlowContext) -> Result<(), FlowError> {
        let value = match context.data(&self.source) {
            Some(value) => value.clone(),
            None => {
                return Err(FlowError::Other(format!(
                    "set-store-value: no data registered under '{}'",
                    self.source
                )))
            }
        };

        context.set_store(&self.target, value);
        Ok(())
    }
}
