//! Built-in trigger types.

use crate::error::TriggerError;
use crate::execution::Context;
use crate::schema::PayloadSchema;
use crate::trigger::{ContextResolver, TriggerDefinition};
use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};

/// `orders.created`: an order was entered.
#[must_use]
pub fn orders_created() -> TriggerDefinition {
    TriggerDefinition::new("orders.created", "Order created")
        .with_description("Fires when a new laundry order is created")
        .with_schema(
            PayloadSchema::object()
                .field("orderId", "string", true)
                .field("branch", "string", false)
                .field("total", "number", false)
                .field("customerId", "string", false),
        )
        .with_resolver(OrderContext)
}

/// `customers.segmented`: a customer moved into a segment.
#[must_use]
pub fn customers_segmented() -> TriggerDefinition {
    TriggerDefinition::new("customers.segmented", "Customer segmented")
        .with_description("Fires when a customer is assigned to a segment")
        .with_schema(
            PayloadSchema::object()
                .field("customerId", "string", true)
                .field("segment", "string", true)
                .field("branch", "string", false),
        )
        .with_resolver(CustomerContext)
}

fn field(payload: &JsonValue, name: &str) -> JsonValue {
    payload.get(name).cloned().unwrap_or(JsonValue::Null)
}

/// Collects the order fields under `order`.
struct OrderContext;

#[async_trait]
impl ContextResolver for OrderContext {
    async fn resolve(&self, payload: &JsonValue) -> Result<Context, TriggerError> {
        let mut context = Context::new();
        context.insert(
            "order".to_string(),
            json!({
                "id": field(payload, "orderId"),
                "branch": field(payload, "branch"),
                "total": field(payload, "total"),
                "customerId": field(payload, "customerId"),
            }),
        );
        Ok(context)
    }
}

/// Collects the customer fields under `customer`.
struct CustomerContext;

#[async_trait]
impl ContextResolver for CustomerContext {
    async fn resolve(&self, payload: &JsonValue) -> Result<Context, TriggerError> {
        let mut context = Context::new();
        context.insert(
            "customer".to_string(),
            json!({
                "id": field(payload, "customerId"),
                "segment": field(payload, "segment"),
                "branch": field(payload, "branch"),
            }),
        );
        Ok(context)
    }
}
