//! `crm.update_field` action.
//!
//! Writes a value into the run context under `crm:<field>`. The value is
//! the configured `value`, else the context entry named by `valueFrom`,
//! else the context's `total`, else null.

use crate::action::{Action, ActionInvocation, ActionResult};
use crate::error::ActionError;
use crate::execution::Context;
use crate::node::{NodeSpec, decode_config};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CrmFieldConfig {
    field: String,
    #[serde(default)]
    value: Option<JsonValue>,
    #[serde(default)]
    value_from: Option<String>,
}

impl CrmFieldConfig {
    fn resolve(&self, context: &Context) -> JsonValue {
        if let Some(value) = self.value.as_ref().filter(|v| !v.is_null()) {
            return value.clone();
        }
        self.value_from
            .as_deref()
            .and_then(|key| context.get(key))
            .or_else(|| context.get("total"))
            .cloned()
            .unwrap_or(JsonValue::Null)
    }
}

/// The `crm.update_field` action.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrmFieldAction;

#[async_trait]
impl Action for CrmFieldAction {
    fn action_type(&self) -> &str {
        "crm.update_field"
    }

    fn label(&self) -> &str {
        "Update CRM field"
    }

    fn description(&self) -> &str {
        "Sets a customer CRM field from a fixed value or a context entry"
    }

    fn supports_simulation(&self) -> bool {
        true
    }

    fn validate(&self, node: &NodeSpec) -> Vec<String> {
        match decode_config::<CrmFieldConfig>(&node.config) {
            Ok(config) if !config.field.trim().is_empty() => Vec::new(),
            _ => vec![format!("CRM node '{}' requires a field name", node.key)],
        }
    }

    async fn run(&self, invocation: ActionInvocation<'_>) -> Result<ActionResult, ActionError> {
        let config: CrmFieldConfig = match invocation.node.decode_config() {
            Ok(config) => config,
            Err(e) => return Ok(ActionResult::failure(format!("invalid configuration: {e}"))),
        };
        let value = config.resolve(invocation.context);
        Ok(ActionResult::success()
            .with_message(format!("Updated CRM field {}", config.field))
            .with_patch(format!("crm:{}", config.field), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: JsonValue) -> CrmFieldConfig {
        serde_json::from_value(value).expect("config")
    }

    fn context(entries: JsonValue) -> Context {
        entries.as_object().cloned().expect("object")
    }

    #[test]
    fn explicit_value_wins() {
        let ctx = context(json!({ "total": 42, "points": 7 }));
        let cfg = config(json!({ "field": "tier", "value": "gold", "valueFrom": "points" }));
        assert_eq!(cfg.resolve(&ctx), json!("gold"));
    }

    #[test]
    fn value_from_then_total_then_null() {
        let ctx = context(json!({ "total": 42, "points": 7 }));
        assert_eq!(
            config(json!({ "field": "f", "valueFrom": "points" })).resolve(&ctx),
            json!(7)
        );
        assert_eq!(
            config(json!({ "field": "f", "valueFrom": "absent" })).resolve(&ctx),
            json!(42)
        );
        assert_eq!(
            config(json!({ "field": "f" })).resolve(&Context::new()),
            JsonValue::Null
        );
    }

    #[test]
    fn validate_requires_field() {
        let node = NodeSpec::action("crm", "crm.update_field");
        assert_eq!(
            CrmFieldAction.validate(&node),
            vec!["CRM node 'crm' requires a field name".to_string()]
        );
        assert!(
            CrmFieldAction
                .validate(&node.with_config("field", "lifetime_value"))
                .is_empty()
        );
    }
}
