//!
//! Standard library of flow actions for the Storeflow platform
//!

pub mod actions;

pub use actions::app_action::WebhookAppActionSource;
pub use actions::flow_control::StopFlowAction;
pub use actions::store::SetStoreValueAction;
pub use actions::tag::AddTagAction;
