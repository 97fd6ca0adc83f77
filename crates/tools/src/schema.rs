//! Parameter schemas and key normalization.
//!
//! A schema is an ordered list of fields with canonical names.  Callers do
//! not always match that casing (`button_text` vs `buttonText`), so
//! [`normalize_params`] remaps near-miss keys before dispatch.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterField {
    /// Canonical key, exactly as the host expects it.
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParamType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

/// Ordered field list for one tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSchema {
    pub fields: Vec<ParameterField>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(self, name: &str, ty: ParamType, description: &str) -> Self {
        self.field(name, ty, true, description)
    }

    pub fn optional(self, name: &str, ty: ParamType, description: &str) -> Self {
        self.field(name, ty, false, description)
    }

    pub fn field(mut self, name: &str, ty: ParamType, required: bool, description: &str) -> Self {
        self.fields.push(ParameterField {
            name: name.to_string(),
            ty,
            required,
            description: description.to_string(),
        });
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParameterField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The declared key `key` stands for, if it is an unambiguous
    /// case/delimiter variant of exactly one field.
    pub fn canonical_key(&self, key: &str) -> Option<&str> {
        if let Some(field) = self.get(key) {
            return Some(&field.name);
        }
        let folded = fold_key(key);
        let mut matches = self.fields.iter().filter(|f| fold_key(&f.name) == folded);
        match (matches.next(), matches.next()) {
            (Some(field), None) => Some(&field.name),
            _ => None,
        }
    }

    /// Render as a JSON Schema object for discovery.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mut prop = Map::new();
            prop.insert("type".into(), json!(field.ty.as_str()));
            if !field.description.is_empty() {
                prop.insert("description".into(), json!(field.description));
            }
            properties.insert(field.name.clone(), Value::Object(prop));
        }
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Lowercase with word delimiters removed: `Button_Text`, `button-text`
/// and `buttonText` all fold to `buttontext`.
fn fold_key(key: &str) -> String {
    key.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Remap `params` keys onto `schema`'s canonical names.
///
/// Exact matches pass through.  A key that differs only by case or word
/// delimiter is renamed to the declared key unless that key is already
/// present.  Everything else passes through unchanged.
pub fn normalize_params(schema: &ParameterSchema, params: Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    let mut passthrough = Vec::new();

    // Exact keys first so they always win a collision with an alias.
    for (key, value) in params {
        if schema.get(&key).is_some() {
            out.insert(key, value);
        } else {
            passthrough.push((key, value));
        }
    }

    for (key, value) in passthrough {
        match schema.canonical_key(&key) {
            Some(canonical) if !out.contains_key(canonical) => {
                tracing::debug!(from = %key, to = %canonical, "normalized parameter key");
                out.insert(canonical.to_string(), value);
            }
            _ => {
                out.insert(key, value);
            }
        }
    }
    out
}
