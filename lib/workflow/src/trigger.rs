//! Trigger registry.
//!
//! A trigger type names a business event ("orders.created"). Its
//! registration carries the payload schema and a resolver that turns a raw
//! payload into context entries for the run. Resolvers may perform I/O.

use crate::error::TriggerError;
use crate::execution::Context;
use crate::schema::PayloadSchema;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Turns a validated trigger payload into context entries.
#[async_trait]
pub trait ContextResolver: Send + Sync {
    /// Resolves the flat key/value context contributed by this trigger.
    async fn resolve(&self, payload: &JsonValue) -> Result<Context, TriggerError>;
}

/// Resolver that contributes nothing beyond the payload itself.
pub struct PayloadOnly;

#[async_trait]
impl ContextResolver for PayloadOnly {
    async fn resolve(&self, _payload: &JsonValue) -> Result<Context, TriggerError> {
        Ok(Context::new())
    }
}

/// A registered trigger type.
#[derive(Clone)]
pub struct TriggerDefinition {
    /// Event type name, the registry key.
    pub trigger_type: String,
    /// Short display label.
    pub label: String,
    /// Longer description for the catalog.
    pub description: String,
    /// Schema the payload must satisfy.
    pub payload_schema: PayloadSchema,
    /// Resolver producing context entries.
    pub resolver: Arc<dyn ContextResolver>,
}

impl TriggerDefinition {
    /// Creates a trigger definition that accepts any payload and resolves no extra context.
    #[must_use]
    pub fn new(trigger_type: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            trigger_type: trigger_type.into(),
            label: label.into(),
            description: String::new(),
            payload_schema: PayloadSchema::any(),
            resolver: Arc::new(PayloadOnly),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the payload schema.
    #[must_use]
    pub fn with_schema(mut self, schema: PayloadSchema) -> Self {
        self.payload_schema = schema;
        self
    }

    /// Sets the context resolver.
    #[must_use]
    pub fn with_resolver(mut self, resolver: impl ContextResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Validates a payload against the schema.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerError::InvalidPayload`] listing every problem.
    pub fn check_payload(&self, payload: &JsonValue) -> Result<(), TriggerError> {
        let problems = self.payload_schema.check(payload);
        if problems.is_empty() {
            Ok(())
        } else {
            Err(TriggerError::InvalidPayload {
                trigger_type: self.trigger_type.clone(),
                problems,
            })
        }
    }

    /// Returns the catalog entry for this trigger.
    #[must_use]
    pub fn catalog_entry(&self) -> TriggerCatalogEntry {
        TriggerCatalogEntry {
            trigger_type: self.trigger_type.clone(),
            label: self.label.clone(),
            description: self.description.clone(),
            payload_schema: self.payload_schema.clone(),
        }
    }
}

impl fmt::Debug for TriggerDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerDefinition")
            .field("trigger_type", &self.trigger_type)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// A trigger as shown in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerCatalogEntry {
    /// Event type name.
    #[serde(rename = "type")]
    pub trigger_type: String,
    /// Display label.
    pub label: String,
    /// Description.
    pub description: String,
    /// Payload schema.
    pub payload_schema: PayloadSchema,
}

/// Lookup table of trigger types.
///
/// Populated before the engine is built and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct TriggerRegistry {
    triggers: BTreeMap<String, TriggerDefinition>,
}

impl TriggerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a trigger, replacing any earlier registration of the same type.
    ///
    /// Returns the replaced registration, if any.
    pub fn register(&mut self, definition: TriggerDefinition) -> Option<TriggerDefinition> {
        self.triggers
            .insert(definition.trigger_type.clone(), definition)
    }

    /// Looks up a trigger type.
    #[must_use]
    pub fn get(&self, trigger_type: &str) -> Option<&TriggerDefinition> {
        self.triggers.get(trigger_type)
    }

    /// Returns true if the type is registered.
    #[must_use]
    pub fn contains(&self, trigger_type: &str) -> bool {
        self.triggers.contains_key(trigger_type)
    }

    /// Lists every registration, ordered by type.
    pub fn list(&self) -> impl Iterator<Item = &TriggerDefinition> {
        self.triggers.values()
    }

    /// Returns the number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }
}
