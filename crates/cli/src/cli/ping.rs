use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use eb_bridge::{BridgeClientBuilder, ConfigFileEndpoint};
use eb_domain::config::Config;

/// Open a connection, handshake, and report how long it took.
pub async fn run(config: &Config, config_path: &Path) -> anyhow::Result<()> {
    let client = BridgeClientBuilder::from_config(config)
        .endpoint(Arc::new(ConfigFileEndpoint::new(config_path)))
        .build()?;

    let started = Instant::now();
    client.connect().await?;
    println!(
        "connected to {} in {} ms",
        config.host.ws_url(),
        started.elapsed().as_millis()
    );
    client.shutdown().await;
    Ok(())
}
