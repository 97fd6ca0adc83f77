//! Owns the single WebSocket to the editor host.
//!
//! The transport opens the socket, performs the handshake, and reports every
//! inbound frame and every disconnect on an event channel.  It never retries
//! a call: losing the connection is reported once per connection
//! *generation* and the retry layer decides what to do about it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eb_domain::config::Config;
use eb_protocol::{parse_inbound, RequestFrame, ResponseFrame, MAX_FRAME_BYTES};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::endpoint::EndpointResolver;
use crate::error::BridgeError;
use crate::reconnect::ReconnectBackoff;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Emitted by the transport, consumed by the client's dispatch loop.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Connected { generation: u64 },
    Frame(ResponseFrame),
    /// Emitted exactly once per generation.
    Disconnected { generation: u64, reason: String },
}

/// The seam between the correlator and the socket.
#[async_trait]
pub trait FrameTransport: Send + Sync + 'static {
    /// Establish a connection if there is none.  Callers arriving while an
    /// attempt is in flight wait for it and get its outcome.
    async fn connect(&self) -> Result<(), BridgeError>;

    /// Queue a frame on the live connection and return its generation.
    fn send(&self, frame: &RequestFrame) -> Result<u64, BridgeError>;

    fn state(&self) -> ConnectionState;

    /// Generation of the live connection, `None` while not connected.
    fn connected_generation(&self) -> Option<u64>;

    async fn disconnect(&self);
}

/// Timing and limits for [`WsTransport`].
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub handshake_timeout: Duration,
    /// `Duration::ZERO` turns the heartbeat off.
    pub heartbeat_interval: Duration,
    pub max_frame_bytes: usize,
    pub backoff: ReconnectBackoff,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl TransportSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            handshake_timeout: cfg.timeouts.handshake(),
            heartbeat_interval: cfg.timeouts.heartbeat(),
            max_frame_bytes: MAX_FRAME_BYTES,
            backoff: ReconnectBackoff::from_config(&cfg.reconnect),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// WsTransport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Link {
    state: ConnectionState,
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<Message>>,
    cancel: Option<CancellationToken>,
}

struct Shared {
    resolver: Arc<dyn EndpointResolver>,
    settings: TransportSettings,
    link: Mutex<Link>,
    events: mpsc::UnboundedSender<TransportEvent>,
    next_generation: AtomicU64,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        self.link.lock().state = state;
    }

    /// Tear down `generation` if it is still the live connection.  The
    /// generation check makes this idempotent across the reader task and
    /// an explicit `disconnect`.
    fn mark_disconnected(&self, generation: u64, reason: String, expected: bool) {
        let cancel = {
            let mut link = self.link.lock();
            if link.generation != generation || link.state != ConnectionState::Connected {
                return;
            }
            link.state = ConnectionState::Disconnected;
            link.outbound = None;
            link.cancel.take()
        };
        if let Some(cancel) = cancel {
            cancel.cancel();
        }

        if expected {
            tracing::info!(generation, reason = %reason, "disconnected from host");
        } else {
            tracing::warn!(generation, reason = %reason, "lost connection to host");
        }
        let _ = self
            .events
            .send(TransportEvent::Disconnected { generation, reason });
    }
}

/// Outcome of the in-flight connect cycle, `None` until it finishes.
type AttemptOutcome = Option<Result<(), BridgeError>>;

enum ConnectRole {
    Leader(watch::Sender<AttemptOutcome>),
    Follower(watch::Receiver<AttemptOutcome>),
}

/// Clears the in-flight slot when the leading caller finishes or is
/// dropped mid-attempt.
struct AttemptSlotGuard<'a> {
    shared: &'a Shared,
    slot: &'a Mutex<Option<watch::Receiver<AttemptOutcome>>>,
}

impl Drop for AttemptSlotGuard<'_> {
    fn drop(&mut self) {
        *self.slot.lock() = None;
        let mut link = self.shared.link.lock();
        if link.state == ConnectionState::Connecting {
            link.state = ConnectionState::Disconnected;
        }
    }
}

/// WebSocket implementation of [`FrameTransport`].
pub struct WsTransport {
    shared: Arc<Shared>,
    attempt: Mutex<Option<watch::Receiver<AttemptOutcome>>>,
}

impl WsTransport {
    /// Create a disconnected transport.  The receiver yields every
    /// [`TransportEvent`] and must be drained by exactly one consumer.
    pub fn new(
        resolver: Arc<dyn EndpointResolver>,
        settings: TransportSettings,
    ) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            resolver,
            settings,
            link: Mutex::new(Link {
                state: ConnectionState::Disconnected,
                generation: 0,
                outbound: None,
                cancel: None,
            }),
            events,
            next_generation: AtomicU64::new(0),
        });
        (
            Self {
                shared,
                attempt: Mutex::new(None),
            },
            rx,
        )
    }

    /// One connection attempt: open the socket, handshake, start the
    /// reader, writer and heartbeat tasks.
    async fn connect_once(&self) -> Result<(), BridgeError> {
        let endpoint = self.shared.resolver.resolve()?;
        let url = endpoint.ws_url();
        let handshake_timeout = self.shared.settings.handshake_timeout;
        tracing::info!(url = %url, client_id = %endpoint.client_id, "connecting to host");

        let (ws, _response) =
            tokio::time::timeout(handshake_timeout, tokio_tungstenite::connect_async(url.as_str()))
                .await
                .map_err(|_| BridgeError::ConnectionUnavailable(format!("connect to {url} timed out")))?
                .map_err(|e| BridgeError::ConnectionUnavailable(format!("connect to {url}: {e}")))?;
        let (mut sink, mut stream) = ws.split();

        // ── Handshake ────────────────────────────────────────────────
        let handshake_id = format!("handshake-{}", uuid::Uuid::new_v4());
        let hello = RequestFrame::handshake(handshake_id.clone(), &endpoint.client_id);
        sink.send(Message::Text(serde_json::to_string(&hello)?))
            .await
            .map_err(|e| BridgeError::ConnectionUnavailable(format!("sending handshake: {e}")))?;

        let reply = tokio::time::timeout(handshake_timeout, async {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => match parse_inbound(&text) {
                        Ok(frame) if frame.id.as_deref() == Some(handshake_id.as_str()) => {
                            return Ok(frame);
                        }
                        Ok(frame) => tracing::debug!(
                            id = ?frame.id,
                            message = ?frame.message,
                            "dropping frame received before handshake completed"
                        ),
                        Err(e) => tracing::warn!(error = %e, "dropping malformed frame during handshake"),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        return Err(BridgeError::ConnectionUnavailable(format!(
                            "during handshake: {e}"
                        )))
                    }
                }
            }
            Err(BridgeError::ConnectionUnavailable(
                "connection closed before handshake response".into(),
            ))
        })
        .await
        .map_err(|_| BridgeError::ConnectionUnavailable("handshake timed out".into()))??;

        if !reply.success {
            return Err(BridgeError::ConnectionUnavailable(format!(
                "handshake rejected: {}",
                reply.message.unwrap_or_else(|| "no reason given".into())
            )));
        }

        // ── Go live ──────────────────────────────────────────────────
        let generation = self.shared.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<Message>();
        let cancel = CancellationToken::new();
        {
            let mut link = self.shared.link.lock();
            link.state = ConnectionState::Connected;
            link.generation = generation;
            link.outbound = Some(outbound_tx.clone());
            link.cancel = Some(cancel.clone());
        }

        tracing::info!(generation, url = %url, "connected to host");
        let _ = self
            .shared
            .events
            .send(TransportEvent::Connected { generation });

        tokio::spawn(write_loop(sink, outbound_rx, cancel.clone()));
        tokio::spawn(heartbeat_loop(
            outbound_tx,
            self.shared.settings.heartbeat_interval,
            cancel.clone(),
        ));
        tokio::spawn(read_loop(self.shared.clone(), stream, generation, cancel));

        Ok(())
    }

    fn join_or_lead(&self) -> ConnectRole {
        let mut slot = self.attempt.lock();
        match slot.as_ref() {
            Some(rx) => ConnectRole::Follower(rx.clone()),
            None => {
                let (tx, rx) = watch::channel(None);
                *slot = Some(rx);
                ConnectRole::Leader(tx)
            }
        }
    }

    /// The full backoff cycle.  Only ever run by the leading caller.
    async fn connect_with_backoff(&self) -> Result<(), BridgeError> {
        let backoff = self.shared.settings.backoff.clone();
        let mut failures: u32 = 0;
        loop {
            self.shared.set_state(ConnectionState::Connecting);
            let err = match self.connect_once().await {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };
            self.shared.set_state(ConnectionState::Disconnected);

            // A broken config will not fix itself between attempts.
            if matches!(err, BridgeError::Config(_)) {
                return Err(err);
            }

            failures += 1;
            let reason = match err {
                BridgeError::ConnectionUnavailable(m) => m,
                other => other.to_string(),
            };
            if backoff.should_give_up(failures) {
                tracing::error!(attempts = failures, error = %reason, "giving up connecting to host");
                return Err(BridgeError::ConnectionUnavailable(format!(
                    "gave up after {failures} attempts: {reason}"
                )));
            }

            let delay = backoff.delay_after(failures);
            tracing::warn!(
                attempt = failures,
                delay_ms = delay.as_millis() as u64,
                error = %reason,
                "connection attempt failed, backing off"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl FrameTransport for WsTransport {
    async fn connect(&self) -> Result<(), BridgeError> {
        loop {
            if self.state() == ConnectionState::Connected {
                return Ok(());
            }
            match self.join_or_lead() {
                ConnectRole::Leader(tx) => {
                    let _slot = AttemptSlotGuard {
                        shared: &self.shared,
                        slot: &self.attempt,
                    };
                    let outcome = self.connect_with_backoff().await;
                    let _ = tx.send(Some(outcome.clone()));
                    return outcome;
                }
                ConnectRole::Follower(mut rx) => {
                    tracing::debug!("joining in-flight connection attempt");
                    let outcome = match rx.wait_for(Option::is_some).await {
                        Ok(done) => done.clone(),
                        // Leader was cancelled; start over.
                        Err(_) => continue,
                    };
                    if let Some(outcome) = outcome {
                        return outcome;
                    }
                }
            }
        }
    }

    fn send(&self, frame: &RequestFrame) -> Result<u64, BridgeError> {
        let json = serde_json::to_string(frame)?;
        let (generation, outbound) = {
            let link = self.shared.link.lock();
            match (&link.state, &link.outbound) {
                (ConnectionState::Connected, Some(tx)) => (link.generation, tx.clone()),
                _ => return Err(BridgeError::not_connected()),
            }
        };
        outbound
            .send(Message::Text(json))
            .map_err(|_| BridgeError::not_connected())?;
        Ok(generation)
    }

    fn state(&self) -> ConnectionState {
        self.shared.link.lock().state
    }

    fn connected_generation(&self) -> Option<u64> {
        let link = self.shared.link.lock();
        (link.state == ConnectionState::Connected).then_some(link.generation)
    }

    async fn disconnect(&self) {
        if let Some(generation) = self.connected_generation() {
            self.shared
                .mark_disconnected(generation, "closed by client".into(), true);
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        if let Some(cancel) = self.shared.link.lock().cancel.take() {
            cancel.cancel();
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Connection tasks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn write_loop(
    mut sink: SplitSink<WsStream, Message>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            msg = outbound.recv() => {
                let Some(msg) = msg else { break };
                if let Err(e) = sink.send(msg).await {
                    tracing::debug!(error = %e, "socket write failed");
                    break;
                }
            }
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        }
    }
}

async fn heartbeat_loop(
    outbound: mpsc::UnboundedSender<Message>,
    interval: Duration,
    cancel: CancellationToken,
) {
    if interval.is_zero() {
        tracing::debug!("heartbeat disabled");
        return;
    }
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if outbound.send(Message::Ping(Vec::new())).is_err() {
                    break;
                }
            }
            _ = cancel.cancelled() => break,
        }
    }
}

async fn read_loop(
    shared: Arc<Shared>,
    mut stream: SplitStream<WsStream>,
    generation: u64,
    cancel: CancellationToken,
) {
    let max_frame = shared.settings.max_frame_bytes;
    let (reason, expected) = loop {
        tokio::select! {
            _ = cancel.cancelled() => break ("closed by client".to_string(), true),
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if text.len() > max_frame {
                        tracing::warn!(bytes = text.len(), max = max_frame, "inbound frame exceeds limit, dropping");
                        continue;
                    }
                    match parse_inbound(&text) {
                        Ok(frame) => {
                            let _ = shared.events.send(TransportEvent::Frame(frame));
                        }
                        Err(e) => tracing::warn!(error = %e, "dropping malformed frame"),
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let detail = frame.map(|f| f.reason.to_string()).unwrap_or_default();
                    break (format!("host closed connection {detail}").trim_end().to_string(), false);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break (format!("socket error: {e}"), false),
                None => break ("socket closed".to_string(), false),
            }
        }
    };
    shared.mark_disconnected(generation, reason, expected);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::StaticEndpoint;
    use eb_domain::config::HostConfig;
    use serde_json::Map;
    use std::sync::atomic::AtomicUsize;

    fn transport_to(port: u16, max_attempts: u32) -> WsTransport {
        let settings = TransportSettings {
            handshake_timeout: Duration::from_secs(2),
            heartbeat_interval: Duration::from_secs(30),
            max_frame_bytes: MAX_FRAME_BYTES,
            backoff: ReconnectBackoff {
                initial_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(20),
                backoff_factor: 2.0,
                max_attempts,
            },
        };
        let host = HostConfig {
            port,
            ..Default::default()
        };
        WsTransport::new(Arc::new(StaticEndpoint(host)), settings).0
    }

    #[test]
    fn starts_disconnected() {
        let t = transport_to(1, 1);
        assert_eq!(t.state(), ConnectionState::Disconnected);
        assert_eq!(t.connected_generation(), None);
    }

    #[test]
    fn send_without_connection_is_undelivered() {
        let t = transport_to(1, 1);
        let err = t
            .send(&RequestFrame::new("1", "get_scene", Map::new()))
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::ConnectionLost {
                delivered: false,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn connect_to_closed_port_is_unavailable() {
        // Bind then drop to get a port with nothing listening.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let t = transport_to(port, 2);
        let err = t.connect().await.unwrap_err();
        match err {
            BridgeError::ConnectionUnavailable(msg) => {
                assert!(msg.contains("gave up after 2 attempts"), "got: {msg}")
            }
            other => panic!("expected ConnectionUnavailable, got {other:?}"),
        }
        assert_eq!(t.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn concurrent_connects_share_one_backoff_cycle() {
        // Accept the TCP connection, then hang up before the WebSocket upgrade.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepts = Arc::new(AtomicUsize::new(0));
        let counter = accepts.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                drop(stream);
            }
        });

        let t = transport_to(port, 2);
        let (a, b, c) = tokio::join!(t.connect(), t.connect(), t.connect());
        for outcome in [a, b, c] {
            assert!(
                matches!(outcome, Err(BridgeError::ConnectionUnavailable(_))),
                "got {outcome:?}"
            );
        }
        assert_eq!(accepts.load(Ordering::SeqCst), 2);
        assert_eq!(t.state(), ConnectionState::Disconnected);

        // The finished cycle is not reused: a later connect tries again.
        assert!(t.connect().await.is_err());
        assert_eq!(accepts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn zero_heartbeat_interval_sends_no_pings() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        heartbeat_loop(tx, Duration::ZERO, CancellationToken::new()).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn disconnect_when_idle_is_noop() {
        let (t, mut events) = WsTransport::new(
            Arc::new(StaticEndpoint(HostConfig::default())),
            TransportSettings::default(),
        );
        t.disconnect().await;
        assert!(events.try_recv().is_err());
    }
}
