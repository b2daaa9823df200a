//! `webhooks.invoke` action.
//!
//! POSTs the trigger payload and run context as JSON to a configured URL.
//! Simulations build the same request but only return it as
//! `webhookPreview`.

use crate::action::{Action, ActionInvocation, ActionResult};
use crate::config::WebhookConfig;
use crate::error::ActionError;
use crate::node::{NodeSpec, decode_config};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct WebhookNodeConfig {
    url: String,
    #[serde(default)]
    headers: BTreeMap<String, String>,
}

/// The `webhooks.invoke` action.
#[derive(Debug, Clone)]
pub struct WebhookAction {
    client: reqwest::Client,
}

impl WebhookAction {
    /// Creates the action with an HTTP client built from `config`.
    ///
    /// # Errors
    ///
    /// Returns the reqwest error if the client cannot be built.
    pub fn new(config: &WebhookConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Action for WebhookAction {
    fn action_type(&self) -> &str {
        "webhooks.invoke"
    }

    fn label(&self) -> &str {
        "Invoke webhook"
    }

    fn description(&self) -> &str {
        "POSTs the trigger payload and context to an external URL"
    }

    fn supports_simulation(&self) -> bool {
        true
    }

    fn validate(&self, node: &NodeSpec) -> Vec<String> {
        let config = match decode_config::<WebhookNodeConfig>(&node.config) {
            Ok(config) => config,
            Err(_) => return vec![format!("Webhook node '{}' requires a url", node.key)],
        };
        match Url::parse(&config.url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Vec::new(),
            Ok(url) => vec![format!(
                "Webhook node '{}' has unsupported url scheme '{}'",
                node.key,
                url.scheme()
            )],
            Err(e) => vec![format!("Webhook node '{}' has an invalid url: {e}", node.key)],
        }
    }

    async fn run(&self, invocation: ActionInvocation<'_>) -> Result<ActionResult, ActionError> {
        let config: WebhookNodeConfig = match invocation.node.decode_config() {
            Ok(config) => config,
            Err(e) => return Ok(ActionResult::failure(format!("invalid configuration: {e}"))),
        };
        let body = json!({
            "workflowId": invocation.trigger.workflow_id.to_string(),
            "executionId": invocation.trigger.execution_id.map(|id| id.to_string()),
            "triggerType": invocation.trigger.trigger_type,
            "payload": invocation.payload,
            "context": invocation.context,
        });

        if invocation.is_simulation() {
            return Ok(ActionResult::success()
                .with_message(format!("Would POST to {}", config.url))
                .with_patch(
                    "webhookPreview",
                    json!({ "url": config.url, "method": "POST", "body": body }),
                ));
        }

        let mut request = self.client.post(&config.url).json(&body);
        for (name, value) in &config.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        debug!(url = %config.url, node_key = %invocation.node.key, "invoking webhook");

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return Ok(ActionResult::failure(format!("webhook request failed: {e}"))),
        };
        let status = response.status();
        if !status.is_success() {
            return Ok(ActionResult::failure(format!(
                "webhook returned status {}",
                status.as_u16()
            )));
        }
        Ok(ActionResult::success()
            .with_message(format!("POST {} returned {}", config.url, status.as_u16()))
            .with_patch("lastWebhookStatus", JsonValue::from(status.as_u16())))
    }
}
