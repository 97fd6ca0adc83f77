//! The process-wide catalog of tool descriptors.
//!
//! Indexed by name (1:1) and by category (1:many).  Filled once at startup
//! and read-mostly afterwards; re-registering a name replaces the old
//! descriptor.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;

use crate::descriptor::ToolDescriptor;

#[derive(Default)]
struct Index {
    by_name: HashMap<String, Arc<ToolDescriptor>>,
    by_category: BTreeMap<String, BTreeSet<String>>,
}

#[derive(Default)]
pub struct ToolRegistry {
    index: RwLock<Index>,
}

/// Discovery view of one category.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryCatalog {
    pub category: String,
    pub tools: Vec<ToolSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
    pub idempotent: bool,
    /// JSON Schema of the parameters.
    pub parameters: Value,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `descriptor`, replacing any tool of the same name.  Returns the
    /// replaced descriptor.
    pub fn register(&self, descriptor: ToolDescriptor) -> Option<Arc<ToolDescriptor>> {
        let mut descriptor = descriptor;
        descriptor.name = descriptor.name.to_ascii_lowercase();
        descriptor.category = descriptor.category.to_ascii_lowercase();
        let name = descriptor.name.clone();
        let category = descriptor.category.clone();

        let mut index = self.index.write();
        let previous = index.by_name.insert(name.clone(), Arc::new(descriptor));

        if let Some(prev) = &previous {
            tracing::warn!(
                tool = %name,
                old_category = %prev.category,
                new_category = %category,
                "tool registered twice, last registration wins"
            );
            let now_empty = index
                .by_category
                .get_mut(&prev.category)
                .map(|names| {
                    names.remove(&name);
                    names.is_empty()
                })
                .unwrap_or(false);
            if now_empty {
                index.by_category.remove(&prev.category);
            }
        }
        index.by_category.entry(category).or_default().insert(name);
        previous
    }

    /// Look up a tool (case-insensitive).
    pub fn get(&self, name: &str) -> Option<Arc<ToolDescriptor>> {
        self.index.read().by_name.get(&name.to_ascii_lowercase()).cloned()
    }

    /// Tools in `category`, sorted by name.  Empty for unknown categories.
    pub fn by_category(&self, category: &str) -> Vec<Arc<ToolDescriptor>> {
        let index = self.index.read();
        index
            .by_category
            .get(&category.to_ascii_lowercase())
            .map(|names| {
                names
                    .iter()
                    .filter_map(|n| index.by_name.get(n).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn categories(&self) -> BTreeSet<String> {
        self.index.read().by_category.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.index.read().by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every category with its tools and parameter schemas.
    pub fn catalog(&self) -> Vec<CategoryCatalog> {
        let index = self.index.read();
        index
            .by_category
            .iter()
            .map(|(category, names)| CategoryCatalog {
                category: category.clone(),
                tools: names
                    .iter()
                    .filter_map(|n| index.by_name.get(n))
                    .map(|d| ToolSummary {
                        name: d.name.clone(),
                        description: d.description.clone(),
                        idempotent: d.idempotent,
                        parameters: d.schema.to_json_schema(),
                    })
                    .collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ParamType, ParameterSchema};

    fn registry() -> ToolRegistry {
        let reg = ToolRegistry::new();
        reg.register(ToolDescriptor::new("create_ui_button", "ui"));
        reg.register(ToolDescriptor::new("create_ui_text", "ui"));
        reg.register(ToolDescriptor::new("create_material", "material"));
        reg
    }

    #[test]
    fn register_and_lookup() {
        let reg = registry();
        assert_eq!(reg.len(), 3);
        assert!(reg.get("create_ui_button").is_some());
        assert!(reg.get("CREATE_UI_BUTTON").is_some());
        assert!(reg.get("missing").is_none());
    }

    #[test]
    fn category_index() {
        let reg = registry();
        let names: Vec<_> = reg.by_category("ui").iter().map(|d| d.name.clone()).collect();
        assert_eq!(names, vec!["create_ui_button", "create_ui_text"]);
        assert!(reg.by_category("nope").is_empty());
        assert_eq!(
            reg.categories().into_iter().collect::<Vec<_>>(),
            vec!["material", "ui"]
        );
    }

    #[test]
    fn last_registration_wins_and_moves_category() {
        let reg = registry();
        let prev = reg.register(
            ToolDescriptor::new("create_ui_text", "text").description("second"),
        );
        assert_eq!(prev.unwrap().category, "ui");
        assert_eq!(reg.len(), 3);
        assert_eq!(reg.get("create_ui_text").unwrap().description, "second");
        assert_eq!(reg.by_category("ui").len(), 1);
        assert_eq!(reg.by_category("text").len(), 1);
    }

    #[test]
    fn emptied_category_disappears() {
        let reg = registry();
        reg.register(ToolDescriptor::new("create_material", "ui"));
        assert!(!reg.categories().contains("material"));
        assert_eq!(reg.by_category("ui").len(), 3);
    }

    #[test]
    fn catalog_renders_schemas() {
        let reg = ToolRegistry::new();
        reg.register(
            ToolDescriptor::new("create_ui_button", "ui")
                .description("Create a button")
                .schema(ParameterSchema::new().required("buttonText", ParamType::String, "Label")),
        );
        let catalog = reg.catalog();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].category, "ui");
        let tool = &catalog[0].tools[0];
        assert_eq!(tool.name, "create_ui_button");
        assert_eq!(tool.parameters["required"], serde_json::json!(["buttonText"]));
    }
}
