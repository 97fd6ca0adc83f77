mod host;
mod lifecycle;
mod load;
mod logging;
mod timing;

pub use host::*;
pub use lifecycle::*;
pub use load::*;
pub use logging::*;
pub use timing::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigIssue {
    fn error(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.host.port == 0 {
            issues.push(ConfigIssue::error("host.port", "port must be greater than 0"));
        }
        if self.host.host.trim().is_empty() {
            issues.push(ConfigIssue::error("host.host", "host must not be empty"));
        }
        if self.host.client_id.trim().is_empty() {
            issues.push(ConfigIssue::error(
                "host.client_id",
                "client_id must not be empty",
            ));
        }
        if !self.host.path.starts_with('/') {
            issues.push(ConfigIssue::error("host.path", "path must start with '/'"));
        }

        if self.timeouts.request_secs == 0 {
            issues.push(ConfigIssue::error(
                "timeouts.request_secs",
                "request timeout must be greater than 0",
            ));
        }
        if self.timeouts.handshake_secs == 0 {
            issues.push(ConfigIssue::error(
                "timeouts.handshake_secs",
                "handshake timeout must be greater than 0",
            ));
        }

        if self.timeouts.heartbeat_secs == 0 {
            issues.push(ConfigIssue::error(
                "timeouts.heartbeat_secs",
                "heartbeat interval must be greater than 0",
            ));
        }

        if self.reconnect.backoff_factor < 1.0 {
            issues.push(ConfigIssue::error(
                "reconnect.backoff_factor",
                "backoff_factor must be at least 1.0",
            ));
        }
        // A host reload settles faster than a full restart; the recovery
        // delay is expected to sit below the reconnect back-off.
        if self.retry.recovery_delay_ms >= self.reconnect.initial_delay_ms {
            issues.push(ConfigIssue::warning(
                "retry.recovery_delay_ms",
                format!(
                    "recovery delay ({}ms) is not below reconnect.initial_delay_ms ({}ms)",
                    self.retry.recovery_delay_ms, self.reconnect.initial_delay_ms
                ),
            ));
        }
        if self.retry.max_retries == 0 {
            issues.push(ConfigIssue::warning(
                "retry.max_retries",
                "retries disabled: host reloads will surface as connection_lost",
            ));
        }

        if self.lifecycle.idle_threshold_secs == 0 {
            issues.push(ConfigIssue::error(
                "lifecycle.idle_threshold_secs",
                "idle threshold must be greater than 0",
            ));
        }
        if self.lifecycle.sweep_interval_secs == 0 {
            issues.push(ConfigIssue::error(
                "lifecycle.sweep_interval_secs",
                "sweep interval must be greater than 0",
            ));
        } else if self.lifecycle.sweep_interval_secs > self.lifecycle.idle_threshold_secs {
            issues.push(ConfigIssue::warning(
                "lifecycle.sweep_interval_secs",
                "sweep interval exceeds idle threshold; idle tools will linger",
            ));
        }

        issues
    }

    /// `true` when [`validate`](Self::validate) reports no errors (warnings allowed).
    pub fn is_valid(&self) -> bool {
        self.validate()
            .iter()
            .all(|i| i.severity != ConfigSeverity::Error)
    }
}
