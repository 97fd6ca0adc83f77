//! `BridgeClient`: the transport, correlator and retry orchestrator wired
//! together behind one handle.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eb_protocol::ResponseFrame;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::correlator::{Correlator, HostResponse};
use crate::error::BridgeError;
use crate::retry::{CallOptions, RetryPolicy, RetryStats, RetryingCaller};
use crate::transport::{ConnectionState, FrameTransport, TransportEvent};

/// Anything that can forward a method call to the host.
///
/// Implemented by [`BridgeClient`]; tool handlers and the lifecycle manager
/// only ever see this trait.
#[async_trait]
pub trait HostCaller: Send + Sync + 'static {
    async fn call_host(
        &self,
        method: &str,
        params: Map<String, Value>,
        opts: CallOptions,
    ) -> Result<HostResponse, BridgeError>;
}

/// Create via [`BridgeClientBuilder`](crate::builder::BridgeClientBuilder).
pub struct BridgeClient {
    transport: Arc<dyn FrameTransport>,
    correlator: Arc<Correlator>,
    caller: RetryingCaller,
    notifications: broadcast::Sender<ResponseFrame>,
    shutdown: CancellationToken,
    dispatch: Mutex<Option<JoinHandle<()>>>,
}

impl BridgeClient {
    pub fn builder() -> crate::builder::BridgeClientBuilder {
        crate::builder::BridgeClientBuilder::new()
    }

    /// Assemble a client over any transport and start its dispatch loop.
    ///
    /// `events` must be the receiver paired with `transport`.  Must be
    /// called from within a Tokio runtime.
    pub fn with_transport(
        transport: Arc<dyn FrameTransport>,
        events: mpsc::UnboundedReceiver<TransportEvent>,
        policy: RetryPolicy,
        default_timeout: Duration,
        notification_capacity: usize,
    ) -> Self {
        let correlator = Arc::new(Correlator::new(transport.clone()));
        let caller = RetryingCaller::new(
            transport.clone(),
            correlator.clone(),
            policy,
            default_timeout,
        );
        let (notifications, _) = broadcast::channel(notification_capacity.max(1));
        let shutdown = CancellationToken::new();

        let dispatch = tokio::spawn(dispatch_loop(
            events,
            correlator.clone(),
            notifications.clone(),
            shutdown.clone(),
        ));

        Self {
            transport,
            correlator,
            caller,
            notifications,
            shutdown,
            dispatch: Mutex::new(Some(dispatch)),
        }
    }

    /// Connect now instead of on the first call.
    pub async fn connect(&self) -> Result<(), BridgeError> {
        if self.shutdown.is_cancelled() {
            return Err(BridgeError::Shutdown);
        }
        self.transport.connect().await
    }

    /// Call with default options (client timeout, not idempotent).
    pub async fn call(
        &self,
        method: &str,
        params: Map<String, Value>,
    ) -> Result<HostResponse, BridgeError> {
        self.call_with(method, params, CallOptions::default()).await
    }

    /// Call `method`, reconnecting and resending across host reloads as
    /// `opts` allows.
    pub async fn call_with(
        &self,
        method: &str,
        params: Map<String, Value>,
        opts: CallOptions,
    ) -> Result<HostResponse, BridgeError> {
        if self.shutdown.is_cancelled() {
            return Err(BridgeError::Shutdown);
        }
        // `shutdown` fails pending calls right after cancelling; the token
        // must be polled first.
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(BridgeError::Shutdown),
            r = self.caller.call(method, params, opts) => r,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.transport.state()
    }

    /// Frames the host sent without an id.
    pub fn subscribe_notifications(&self) -> broadcast::Receiver<ResponseFrame> {
        self.notifications.subscribe()
    }

    pub fn retry_stats(&self) -> RetryStats {
        self.caller.stats()
    }

    pub fn pending_count(&self) -> usize {
        self.correlator.pending_count()
    }

    /// Close the connection, fail outstanding calls with `Shutdown` and
    /// stop the dispatch loop.  Later calls fail immediately.
    pub async fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        tracing::info!(pending = self.pending_count(), "shutting down bridge client");
        self.shutdown.cancel();
        self.transport.disconnect().await;
        self.correlator.fail_all("client shut down");

        let handle = self.dispatch.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

#[async_trait]
impl HostCaller for BridgeClient {
    async fn call_host(
        &self,
        method: &str,
        params: Map<String, Value>,
        opts: CallOptions,
    ) -> Result<HostResponse, BridgeError> {
        self.call_with(method, params, opts).await
    }
}

impl Drop for BridgeClient {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Routes transport events: responses to the correlator, notifications to
/// subscribers, disconnects to the correlator's generation failure.
async fn dispatch_loop(
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    correlator: Arc<Correlator>,
    notifications: broadcast::Sender<ResponseFrame>,
    shutdown: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            ev = events.recv() => match ev {
                Some(ev) => ev,
                None => break,
            },
            _ = shutdown.cancelled() => break,
        };

        match event {
            TransportEvent::Connected { generation } => {
                tracing::debug!(generation, "dispatch: connection up");
            }
            TransportEvent::Frame(frame) if frame.is_notification() => {
                tracing::debug!(message = ?frame.message, "host notification");
                let _ = notifications.send(frame);
            }
            TransportEvent::Frame(frame) => {
                correlator.complete(frame);
            }
            TransportEvent::Disconnected { generation, reason } => {
                correlator.fail_generation(generation, &reason);
            }
        }
    }
    tracing::debug!("dispatch loop stopped");
}
