use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use storeflow_core::{AppActionPayload, AppActionSource, DataPacket, FlowContext, FlowError};
use tracing::debug;

/// Fetches app action payloads from the app system's webhook endpoint
///
/// Externally installed apps register their actions with a backing
/// webhook; before the engine delegates such an action, the payload
/// and headers configured for it are fetched from here.
pub struct WebhookAppActionSource {
    client: Client,
    base_url: String,
}

// Shape of the endpoint response
#[derive(Debug, Deserialize)]
struct WebhookConfigResponse {
    payload: serde_json::Value,
    #[serde(default)]
    headers: HashMap<String, String>,
}

impl WebhookAppActionSource {
    /// Create a source against the given app system base URL
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, app_action_id: &str) -> String {
        format!("{}/app-actions/{}", self.base_url, app_action_id)
    }
}

#[async_trait]
impl AppActionSource for WebhookAppActionSource {
    async fn fetch(
        &self,
        app_action_id: &str,
        context: &FlowContext,
    ) -> Result<AppActionPayload, FlowError> {
        let endpoint = self.endpoint(app_action_id);
        debug!(app_action_id = %app_action_id, endpoint = %endpoint, "fetching app action payload");

        let response = self
            .client
            .post(&endpoint)
            .json(&json!({
                "event": context.event_name(),
                "tenant": context.scope().tenant_id,
            }))
            .send()
            .await
            .map_err(|err| FlowError::AppAction(format!("webhook request failed: {}", err)))?;

        if !response.status().is_success() {
            return Err(FlowError::AppAction(format!(
                "webhook for app action {} returned status {}",
                app_action_id,
                response.status()
            )));
        }

        let body: WebhookConfigResponse = response
            .json()
            .await
            .map_err(|err| FlowError::AppAction(format!("invalid webhook response: {}", err)))?;

        Ok(AppActionPayload {
            payload: DataPacket::new(body.payload),
            headers: body.headers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_building_normalizes_trailing_slash() {
        let source = WebhookAppActionSource::new("https://apps.example.com/");
        assert_eq!(
            source.endpoint("app-1"),
            "https://apps.example.com/app-actions/app-1"
        );
    }

    #[test]
    fn test_response_shape_accepts_missing_headers() {
        let body: WebhookConfigResponse =
            serde_json::from_value(json!({"payload": {"orderId": "order-1"}})).unwrap();

        assert!(body.headers.is_empty());
        assert_eq!(body.payload["orderId"], "order-1");
    }
}
