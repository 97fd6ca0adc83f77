use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Timeouts
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Per-call response window. Generous: host operations can block on
    /// modal dialogs or long imports.
    #[serde(default = "d_30")]
    pub request_secs: u64,
    /// How long to wait for the handshake response after the socket opens.
    #[serde(default = "d_10")]
    pub handshake_secs: u64,
    /// Interval between WebSocket keep-alive pings.
    #[serde(default = "d_30")]
    pub heartbeat_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            handshake_secs: 10,
            heartbeat_secs: 30,
        }
    }
}

impl TimeoutConfig {
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn handshake(&self) -> Duration {
        Duration::from_secs(self.handshake_secs)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Reload recovery retry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after a lost connection before the loss is surfaced.
    #[serde(default = "d_3")]
    pub max_retries: u32,
    /// Fixed wait before reconnecting after a lost connection, sized to the
    /// host's script reload.
    #[serde(default = "d_1000")]
    pub recovery_delay_ms: u64,
    /// Retry non-idempotent calls when the frame provably never reached
    /// the socket.
    #[serde(default = "d_true")]
    pub retry_undelivered: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            recovery_delay_ms: 1_000,
            retry_undelivered: true,
        }
    }
}

impl RetryConfig {
    pub fn recovery_delay(&self) -> Duration {
        Duration::from_millis(self.recovery_delay_ms)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Reconnect back-off
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "d_2000")]
    pub initial_delay_ms: u64,
    #[serde(default = "d_30000")]
    pub max_delay_ms: u64,
    #[serde(default = "d_2_0")]
    pub backoff_factor: f64,
    /// Connection attempts per `connect` before giving up (`0` = unlimited).
    #[serde(default = "d_5")]
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 2_000,
            max_delay_ms: 30_000,
            backoff_factor: 2.0,
            max_attempts: 5,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_3() -> u32 {
    3
}
fn d_5() -> u32 {
    5
}
fn d_10() -> u64 {
    10
}
fn d_30() -> u64 {
    30
}
fn d_1000() -> u64 {
    1_000
}
fn d_2000() -> u64 {
    2_000
}
fn d_30000() -> u64 {
    30_000
}
fn d_2_0() -> f64 {
    2.0
}
fn d_true() -> bool {
    true
}
