//! Builder pattern for constructing a [`BridgeClient`].

use std::sync::Arc;
use std::time::Duration;

use eb_domain::config::{Config, HostConfig};

use crate::client::BridgeClient;
use crate::endpoint::{EndpointResolver, StaticEndpoint};
use crate::error::BridgeError;
use crate::reconnect::ReconnectBackoff;
use crate::retry::RetryPolicy;
use crate::transport::{TransportSettings, WsTransport};

/// Fluent builder for [`BridgeClient`].
///
/// # Example
///
/// ```rust,no_run
/// # use eb_bridge::BridgeClientBuilder;
/// # async fn demo() -> Result<(), eb_bridge::BridgeError> {
/// let client = BridgeClientBuilder::new()
///     .host("127.0.0.1", 6400)
///     .client_id("my-agent")
///     .request_timeout(std::time::Duration::from_secs(60))
///     .build()?;
/// client.connect().await?;
/// # Ok(())
/// # }
/// ```
pub struct BridgeClientBuilder {
    host: HostConfig,
    endpoint: Option<Arc<dyn EndpointResolver>>,
    transport: TransportSettings,
    retry: RetryPolicy,
    request_timeout: Duration,
    notification_capacity: usize,
}

impl BridgeClientBuilder {
    pub fn new() -> Self {
        Self::from_config(&Config::default())
    }

    /// Seed every setting from a loaded config.
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            host: cfg.host.clone(),
            endpoint: None,
            transport: TransportSettings::from_config(cfg),
            retry: RetryPolicy::from_config(&cfg.retry),
            request_timeout: cfg.timeouts.request(),
            notification_capacity: 64,
        }
    }

    // ── Endpoint ─────────────────────────────────────────────────────

    /// Connect to a fixed host and port.
    pub fn host(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host.host = host.into();
        self.host.port = port;
        self
    }

    /// Identity announced in the handshake.
    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.host.client_id = id.into();
        self
    }

    /// Resolve the endpoint afresh on every connect instead of using the
    /// fixed host.  Overrides [`host`](Self::host) and
    /// [`client_id`](Self::client_id).
    pub fn endpoint(mut self, resolver: Arc<dyn EndpointResolver>) -> Self {
        self.endpoint = Some(resolver);
        self
    }

    // ── Behavior ─────────────────────────────────────────────────────

    /// Default per-call response window (default 30s).
    pub fn request_timeout(mut self, d: Duration) -> Self {
        self.request_timeout = d;
        self
    }

    pub fn handshake_timeout(mut self, d: Duration) -> Self {
        self.transport.handshake_timeout = d;
        self
    }

    pub fn heartbeat_interval(mut self, d: Duration) -> Self {
        self.transport.heartbeat_interval = d;
        self
    }

    /// Override the backoff between connection attempts.
    pub fn reconnect_backoff(mut self, backoff: ReconnectBackoff) -> Self {
        self.transport.backoff = backoff;
        self
    }

    /// Override the reload-recovery retry policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Inbound frames larger than this are dropped (default 4 MiB).
    pub fn max_frame_bytes(mut self, n: usize) -> Self {
        self.transport.max_frame_bytes = n;
        self
    }

    pub fn notification_capacity(mut self, n: usize) -> Self {
        self.notification_capacity = n;
        self
    }

    /// Build the client.  Must be called from within a Tokio runtime; the
    /// connection itself is opened lazily or by
    /// [`BridgeClient::connect`].
    pub fn build(self) -> Result<BridgeClient, BridgeError> {
        if self.request_timeout.is_zero() {
            return Err(BridgeError::Config("request timeout must be non-zero".into()));
        }
        if self.transport.handshake_timeout.is_zero() {
            return Err(BridgeError::Config("handshake timeout must be non-zero".into()));
        }
        if self.transport.heartbeat_interval.is_zero() {
            return Err(BridgeError::Config("heartbeat interval must be non-zero".into()));
        }

        if !self.transport.backoff.outlasts_recovery(self.retry.recovery_delay) {
            tracing::warn!(
                reconnect_ms = self.transport.backoff.initial_delay.as_millis() as u64,
                recovery_ms = self.retry.recovery_delay.as_millis() as u64,
                "reconnect back-off does not start above the reload recovery delay"
            );
        }

        let resolver: Arc<dyn EndpointResolver> = match self.endpoint {
            Some(resolver) => resolver,
            None => {
                if self.host.host.is_empty() || self.host.port == 0 {
                    return Err(BridgeError::Config(
                        "host address and a non-zero port are required".into(),
                    ));
                }
                Arc::new(StaticEndpoint(self.host))
            }
        };

        let (transport, events) = WsTransport::new(resolver, self.transport);
        Ok(BridgeClient::with_transport(
            Arc::new(transport),
            events,
            self.retry,
            self.request_timeout,
            self.notification_capacity,
        ))
    }
}

impl Default for BridgeClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
