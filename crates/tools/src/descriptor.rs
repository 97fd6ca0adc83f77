use std::fmt;
use std::sync::Arc;

use eb_bridge::CallOptions;

use crate::handler::{ForwardingFactory, HandlerFactory};
use crate::schema::ParameterSchema;

/// Immutable metadata for one tool.
#[derive(Clone)]
pub struct ToolDescriptor {
    /// Unique, lowercase.
    pub name: String,
    pub category: String,
    pub description: String,
    /// Host method the tool forwards to (defaults to `name`).
    pub method: String,
    pub schema: ParameterSchema,
    /// Safe to resend after a reload dropped the connection mid-call.
    pub idempotent: bool,
    pub factory: Arc<dyn HandlerFactory>,
}

impl ToolDescriptor {
    /// A forwarding tool calling the host method `name`.
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        let name = name.into().to_ascii_lowercase();
        Self {
            method: name.clone(),
            name,
            category: category.into().to_ascii_lowercase(),
            description: String::new(),
            schema: ParameterSchema::default(),
            idempotent: false,
            factory: Arc::new(ForwardingFactory),
        }
    }

    pub fn description(mut self, d: impl Into<String>) -> Self {
        self.description = d.into();
        self
    }

    pub fn method(mut self, m: impl Into<String>) -> Self {
        self.method = m.into();
        self
    }

    pub fn schema(mut self, schema: ParameterSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }

    pub fn factory(mut self, factory: Arc<dyn HandlerFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn call_options(&self) -> CallOptions {
        CallOptions {
            timeout: None,
            idempotent: self.idempotent,
        }
    }
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("method", &self.method)
            .field("idempotent", &self.idempotent)
            .field("fields", &self.schema.fields.len())
            .finish()
    }
}
