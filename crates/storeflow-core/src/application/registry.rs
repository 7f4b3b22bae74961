use crate::FlowAction;
use std::collections::HashMap;
use std::sync::Arc;

/// Name-keyed table of flow action handlers
///
/// Built once at process bootstrap; the executor resolves handlers
/// through this table, never through reflection or runtime discovery.
#[derive(Default)]
pub struct FlowActionRegistry {
    actions: HashMap<String, Arc<dyn FlowAction>>,
}

impl FlowActionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own name
    ///
    /// A later registration under the same name replaces the earlier one.
    pub fn register(&mut self, action: Arc<dyn FlowAction>) {
        self.actions.insert(action.name().to_string(), action);
    }

    /// Builder-style variant of [`register`](Self::register)
    pub fn with_action(mut self, action: Arc<dyn FlowAction>) -> Self {
        self.register(action);
        self
    }

    /// Resolve a handler by action name
    pub fn get(&self, name: &str) -> Option<Arc<dyn FlowAction>> {
        self.actions.get(name).cloned()
    }

    /// Names of all registered actions
    pub fn names(&self) -> Vec<&str> {
        self.actions.keys().map(String::as_str).collect()
    }
}
