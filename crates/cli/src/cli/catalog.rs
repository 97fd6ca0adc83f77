use eb_tools::{register_builtin_tools, CategoryCatalog, ToolRegistry};

/// Print the built-in catalog, optionally limited to one category.
pub fn run(category: Option<&str>, json: bool) -> anyhow::Result<()> {
    let registry = ToolRegistry::new();
    register_builtin_tools(&registry);

    let catalog: Vec<CategoryCatalog> = registry
        .catalog()
        .into_iter()
        .filter(|c| category.map_or(true, |want| c.category.eq_ignore_ascii_case(want)))
        .collect();
    if let Some(want) = category {
        if catalog.is_empty() {
            anyhow::bail!("unknown category '{want}'");
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&catalog)?);
        return Ok(());
    }

    for entry in &catalog {
        println!("{} ({} tools)", entry.category, entry.tools.len());
        for tool in &entry.tools {
            println!("  {:<24} {}", tool.name, tool.description);
        }
    }
    Ok(())
}
