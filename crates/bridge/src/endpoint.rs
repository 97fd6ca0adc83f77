//! Where to connect.  Resolved once per connection attempt, never per call.

use std::path::PathBuf;

use eb_domain::config::{apply_env_overrides, load_config_from, HostConfig};

use crate::error::BridgeError;

/// Supplies the host endpoint and client identity for the next connection.
pub trait EndpointResolver: Send + Sync + 'static {
    fn resolve(&self) -> Result<HostConfig, BridgeError>;
}

/// A fixed endpoint, e.g. one taken from an already-loaded config.
#[derive(Debug, Clone)]
pub struct StaticEndpoint(pub HostConfig);

impl EndpointResolver for StaticEndpoint {
    fn resolve(&self) -> Result<HostConfig, BridgeError> {
        Ok(self.0.clone())
    }
}

/// Re-reads the `[host]` table of a config file on every (re)connect, so
/// a host that comes back on a different port is picked up.
#[derive(Debug, Clone)]
pub struct ConfigFileEndpoint {
    path: PathBuf,
}

impl ConfigFileEndpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl EndpointResolver for ConfigFileEndpoint {
    fn resolve(&self) -> Result<HostConfig, BridgeError> {
        let mut config =
            load_config_from(&self.path).map_err(|e| BridgeError::Config(e.to_string()))?;
        apply_env_overrides(&mut config, |var| std::env::var(var).ok())
            .map_err(|e| BridgeError::Config(e.to_string()))?;
        Ok(config.host)
    }
}
