//! `notifications.dispatch` action.
//!
//! Sends a templated message over a channel (email, sms, push) to an
//! audience. Delivery goes through a [`Notifier`]; the default one only
//! records the dispatch in the trace log.

use crate::action::{Action, ActionInvocation, ActionResult};
use crate::error::ActionError;
use crate::execution::Context;
use crate::node::{NodeSpec, decode_config};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use washline_core::WorkflowId;

const DEFAULT_AUDIENCE: &str = "customer";

#[derive(Debug, Deserialize)]
struct NotificationConfig {
    channel: String,
    #[serde(default)]
    template: Option<String>,
    #[serde(default)]
    audience: Option<String>,
}

/// One message to deliver.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Workflow that sent it.
    pub workflow_id: WorkflowId,
    /// Delivery channel.
    pub channel: String,
    /// Template name, if any.
    pub template: Option<String>,
    /// Who receives it.
    pub audience: String,
    /// Run context at the time of sending, for template rendering.
    pub context: Context,
}

/// Delivers notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers one notification.
    async fn dispatch(&self, notification: &Notification) -> Result<(), ActionError>;
}

/// Notifier that writes each dispatch to the trace log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn dispatch(&self, notification: &Notification) -> Result<(), ActionError> {
        tracing::info!(
            workflow_id = %notification.workflow_id,
            channel = %notification.channel,
            template = ?notification.template,
            audience = %notification.audience,
            "notification dispatched"
        );
        Ok(())
    }
}

/// The `notifications.dispatch` action.
#[derive(Clone)]
pub struct NotificationAction {
    notifier: Arc<dyn Notifier>,
}

impl NotificationAction {
    /// Creates the action with a custom notifier.
    #[must_use]
    pub fn new(notifier: impl Notifier + 'static) -> Self {
        Self {
            notifier: Arc::new(notifier),
        }
    }
}

impl Default for NotificationAction {
    fn default() -> Self {
        Self::new(LogNotifier)
    }
}

#[async_trait]
impl Action for NotificationAction {
    fn action_type(&self) -> &str {
        "notifications.dispatch"
    }

    fn label(&self) -> &str {
        "Dispatch notification"
    }

    fn description(&self) -> &str {
        "Sends a templated notification over email, sms or push"
    }

    fn supports_simulation(&self) -> bool {
        true
    }

    fn validate(&self, node: &NodeSpec) -> Vec<String> {
        match decode_config::<NotificationConfig>(&node.config) {
            Ok(config) if config.channel.trim().is_empty() => {
                vec![format!("Notification node '{}' requires a channel", node.key)]
            }
            Ok(_) => Vec::new(),
            Err(_) if !node.config.contains_key("channel") => {
                vec![format!("Notification node '{}' requires a channel", node.key)]
            }
            Err(e) => vec![format!(
                "Notification node '{}' has invalid configuration: {e}",
                node.key
            )],
        }
    }

    async fn run(&self, invocation: ActionInvocation<'_>) -> Result<ActionResult, ActionError> {
        let config: NotificationConfig = match invocation.node.decode_config() {
            Ok(config) => config,
            Err(e) => return Ok(ActionResult::failure(format!("invalid configuration: {e}"))),
        };
        let notification = Notification {
            workflow_id: invocation.trigger.workflow_id,
            channel: config.channel,
            template: config.template,
            audience: config
                .audience
                .unwrap_or_else(|| DEFAULT_AUDIENCE.to_string()),
            context: invocation.context.clone(),
        };

        let message = if invocation.is_simulation() {
            format!("Would send {} notification", notification.channel)
        } else {
            if let Err(e) = self.notifier.dispatch(&notification).await {
                return Ok(ActionResult::failure(e.message));
            }
            format!(
                "Sent {} notification to {}",
                notification.channel, notification.audience
            )
        };

        let mut result = ActionResult::success()
            .with_message(message)
            .with_patch("lastNotificationChannel", notification.channel);
        if let Some(template) = notification.template {
            result = result.with_patch("lastNotificationTemplate", template);
        }
        Ok(result)
    }
}
