use std::path::{Path, PathBuf};

use super::Config;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "EB_CONFIG";
/// Config file used when [`CONFIG_ENV`] is unset.
pub const DEFAULT_CONFIG_FILE: &str = "editor-bridge.toml";

#[derive(thiserror::Error, Debug)]
pub enum ConfigLoadError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid {var}: {value:?}")]
    Env { var: &'static str, value: String },
}

/// Resolve the config path from `EB_CONFIG` (or the default file name).
pub fn config_path() -> PathBuf {
    std::env::var(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Load the configuration from [`config_path`], then apply environment
/// overrides.  Returns the parsed [`Config`] and the path that was used.
pub fn load_config() -> Result<(Config, PathBuf), ConfigLoadError> {
    let path = config_path();
    let mut config = load_config_from(&path)?;
    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    Ok((config, path))
}

/// Parse a TOML config file.  A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigLoadError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }

    let raw = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Apply `EB_HOST`, `EB_PORT` and `EB_CLIENT_ID` on top of a loaded config.
///
/// The lookup is injected so tests do not have to mutate process env.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigLoadError>
where
    F: Fn(&'static str) -> Option<String>,
{
    if let Some(host) = lookup("EB_HOST").filter(|v| !v.is_empty()) {
        config.host.host = host;
    }
    if let Some(raw) = lookup("EB_PORT").filter(|v| !v.is_empty()) {
        config.host.port = raw.parse().map_err(|_| ConfigLoadError::Env {
            var: "EB_PORT",
            value: raw.clone(),
        })?;
    }
    if let Some(id) = lookup("EB_CLIENT_ID").filter(|v| !v.is_empty()) {
        config.host.client_id = id;
    }
    Ok(())
}
