//! Retry orchestrator.  Makes a host reload look like latency.
//!
//! Only `ConnectionLost` is ever retried.  `Timeout` and `HostError` pass
//! through untouched, and `ConnectionUnavailable` from the reconnect step
//! ends the call immediately.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use eb_domain::config::RetryConfig;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::correlator::{Correlator, HostResponse};
use crate::error::BridgeError;
use crate::transport::FrameTransport;

/// Per-call knobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Response window; `None` uses the client default.
    pub timeout: Option<Duration>,
    /// Safe to resend after the host may already have seen it.
    pub idempotent: bool,
}

impl CallOptions {
    pub fn idempotent() -> Self {
        Self {
            timeout: None,
            idempotent: true,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Wait before reconnecting, sized to the host's reload.
    pub recovery_delay: Duration,
    /// Resend non-idempotent calls whose frame never reached the socket.
    pub retry_undelivered: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            recovery_delay: cfg.recovery_delay(),
            retry_undelivered: cfg.retry_undelivered,
        }
    }

    /// Whether `err` is worth another attempt for a call made with `opts`.
    pub fn should_retry(&self, err: &BridgeError, opts: &CallOptions) -> bool {
        match err {
            BridgeError::ConnectionLost { delivered, .. } => {
                opts.idempotent || (!delivered && self.retry_undelivered)
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetryStats {
    /// Logical retries issued.
    pub retries: u64,
    /// Calls that still lost their connection after the last retry.
    pub exhausted: u64,
}

/// Wraps the correlator with reconnect-and-resend on lost connections.
pub struct RetryingCaller {
    transport: Arc<dyn FrameTransport>,
    correlator: Arc<Correlator>,
    policy: RetryPolicy,
    default_timeout: Duration,
    retries: AtomicU64,
    exhausted: AtomicU64,
}

impl RetryingCaller {
    pub fn new(
        transport: Arc<dyn FrameTransport>,
        correlator: Arc<Correlator>,
        policy: RetryPolicy,
        default_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            correlator,
            policy,
            default_timeout,
            retries: AtomicU64::new(0),
            exhausted: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn call(
        &self,
        method: &str,
        params: Map<String, Value>,
        opts: CallOptions,
    ) -> Result<HostResponse, BridgeError> {
        let timeout = opts.timeout.unwrap_or(self.default_timeout);
        let mut attempt: u32 = 0;

        loop {
            self.transport.connect().await?;

            let err = match self.correlator.call(method, params.clone(), timeout).await {
                Ok(resp) => {
                    if attempt > 0 {
                        tracing::info!(method, retries = attempt, "call recovered after reconnect");
                    }
                    return Ok(resp);
                }
                Err(e) => e,
            };

            if !self.policy.should_retry(&err, &opts) {
                if let BridgeError::ConnectionLost { delivered: true, .. } = err {
                    tracing::warn!(
                        method,
                        "connection lost after a non-idempotent call was sent, not resending"
                    );
                }
                return Err(err);
            }

            if attempt >= self.policy.max_retries {
                self.exhausted.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    method,
                    retries = attempt,
                    error = %err,
                    "host did not recover within the retry bound"
                );
                return Err(err);
            }

            attempt += 1;
            self.retries.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                method,
                attempt,
                max_retries = self.policy.max_retries,
                delay_ms = self.policy.recovery_delay.as_millis() as u64,
                error = %err,
                "connection lost, retrying after recovery delay"
            );
            tokio::time::sleep(self.policy.recovery_delay).await;
        }
    }

    pub fn stats(&self) -> RetryStats {
        RetryStats {
            retries: self.retries.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
        }
    }
}
