//! Triggers and actions shipped with the engine.
//!
//! Triggers: `orders.created`, `customers.segmented`.
//! Actions: `notifications.dispatch`, `webhooks.invoke`, `crm.update_field`.

pub mod crm;
pub mod notification;
pub mod triggers;
pub mod webhook;

pub use crm::CrmFieldAction;
pub use notification::{LogNotifier, Notification, NotificationAction, Notifier};
pub use triggers::{customers_segmented, orders_created};
pub use webhook::WebhookAction;

use crate::config::WebhookConfig;
use crate::engine::EngineBuilder;

/// Registers every built-in trigger and action.
///
/// # Errors
///
/// Returns the reqwest error if the webhook HTTP client cannot be built.
pub fn register(
    builder: EngineBuilder,
    webhook: &WebhookConfig,
) -> Result<EngineBuilder, reqwest::Error> {
    Ok(builder
        .trigger(orders_created())
        .trigger(customers_segmented())
        .action(NotificationAction::default())
        .action(WebhookAction::new(webhook)?)
        .action(CrmFieldAction))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;

    #[test]
    fn registers_every_builtin() {
        let engine = register(Engine::builder(), &WebhookConfig::default())
            .expect("register")
            .build();
        let catalog = engine.catalog();
        let triggers: Vec<_> = catalog.triggers.iter().map(|t| t.trigger_type.as_str()).collect();
        let actions: Vec<_> = catalog.actions.iter().map(|a| a.action_type.as_str()).collect();
        assert_eq!(triggers, vec!["customers.segmented", "orders.created"]);
        assert_eq!(
            actions,
            vec!["crm.update_field", "notifications.dispatch", "webhooks.invoke"]
        );
    }
}
