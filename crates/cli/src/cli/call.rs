use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use eb_bridge::{BridgeClientBuilder, ConfigFileEndpoint, HostCaller};
use eb_domain::config::Config;
use eb_tools::{register_builtin_tools, LifecycleManager, ToolRegistry};
use serde_json::{Map, Value};

/// Invoke `tool` through the zero-registration path and print the result.
pub async fn run(
    config: &Config,
    config_path: &Path,
    tool: &str,
    params: &str,
    json: bool,
) -> anyhow::Result<()> {
    let params = parse_params(params)?;

    let registry = Arc::new(ToolRegistry::new());
    register_builtin_tools(&registry);

    let client = Arc::new(
        BridgeClientBuilder::from_config(config)
            .endpoint(Arc::new(ConfigFileEndpoint::new(config_path)))
            .build()?,
    );
    let host: Arc<dyn HostCaller> = client.clone();
    let manager = LifecycleManager::new(registry, host, &config.lifecycle);

    let result = manager.invoke_direct(tool, params).await;
    client.shutdown().await;
    let resp = result.with_context(|| format!("calling {tool}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&resp.into_value())?);
        return Ok(());
    }
    println!("{}", resp.message.as_deref().unwrap_or("ok"));
    for (key, value) in &resp.fields {
        println!("  {key}: {value}");
    }
    Ok(())
}

/// Parse `--params`, which must be a JSON object.
pub fn parse_params(raw: &str) -> anyhow::Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw).context("--params is not valid JSON")? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("--params must be a JSON object, got {other}"),
    }
}
