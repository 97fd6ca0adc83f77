//! In-process mock editor host: a tiny WebSocket server that answers the
//! handshake and then lets each test script how requests are handled.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use eb_bridge::{BridgeClient, BridgeClientBuilder, ReconnectBackoff, RetryPolicy};
use eb_protocol::{RequestFrame, ResponseFrame, HANDSHAKE_METHOD};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// What the host does with one request.
pub enum Action {
    Reply(ResponseFrame),
    /// Send several frames in order (notifications, stray ids, the reply).
    Many(Vec<ResponseFrame>),
    ReplyAfter(Duration, ResponseFrame),
    /// Drop the socket without answering, like a script reload.
    Close,
    Ignore,
}

type Behavior = Arc<dyn Fn(&RequestFrame, usize) -> Action + Send + Sync>;

pub struct MockHost {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<(usize, RequestFrame)>>>,
    handshakes: Arc<Mutex<Vec<RequestFrame>>>,
    connections: Arc<AtomicUsize>,
}

impl MockHost {
    /// Start a host that accepts every handshake.  `behavior` receives each
    /// request and the 1-based index of the connection it arrived on.
    pub async fn start(
        behavior: impl Fn(&RequestFrame, usize) -> Action + Send + Sync + 'static,
    ) -> Self {
        Self::start_with(true, behavior).await
    }

    pub async fn start_with(
        accept_handshake: bool,
        behavior: impl Fn(&RequestFrame, usize) -> Action + Send + Sync + 'static,
    ) -> Self {
        Self::spawn(accept_handshake, Vec::new(), behavior).await
    }

    /// Like [`start`](Self::start), but every handshake reply is preceded
    /// by `preamble`, sent as raw text frames.
    pub async fn start_with_preamble(
        preamble: Vec<String>,
        behavior: impl Fn(&RequestFrame, usize) -> Action + Send + Sync + 'static,
    ) -> Self {
        Self::spawn(true, preamble, behavior).await
    }

    async fn spawn(
        accept_handshake: bool,
        preamble: Vec<String>,
        behavior: impl Fn(&RequestFrame, usize) -> Action + Send + Sync + 'static,
    ) -> Self {
        let preamble = Arc::new(preamble);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let behavior: Behavior = Arc::new(behavior);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handshakes = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));

        let host = Self {
            addr,
            requests: requests.clone(),
            handshakes: handshakes.clone(),
            connections: connections.clone(),
        };

        tokio::spawn(async move {
            while let Ok((stream, _peer)) = listener.accept().await {
                let behavior = behavior.clone();
                let preamble = preamble.clone();
                let requests = requests.clone();
                let handshakes = handshakes.clone();
                let conn = connections.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::spawn(async move {
                    let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    serve(ws, conn, accept_handshake, preamble, behavior, requests, handshakes).await;
                });
            }
        });

        host
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Non-handshake requests in arrival order.
    pub fn requests(&self) -> Vec<RequestFrame> {
        self.requests.lock().iter().map(|(_, r)| r.clone()).collect()
    }

    pub fn requests_on(&self, conn: usize) -> Vec<RequestFrame> {
        self.requests
            .lock()
            .iter()
            .filter(|(c, _)| *c == conn)
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub fn handshakes(&self) -> Vec<RequestFrame> {
        self.handshakes.lock().clone()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

async fn serve(
    ws: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    conn: usize,
    accept_handshake: bool,
    preamble: Arc<Vec<String>>,
    behavior: Behavior,
    requests: Arc<Mutex<Vec<(usize, RequestFrame)>>>,
    handshakes: Arc<Mutex<Vec<RequestFrame>>>,
) {
    let (mut sink, mut stream) = ws.split();
    let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(async move {
        while let Some(text) = raw_rx.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });
    let out_tx = FrameSender(raw_tx.clone());

    while let Some(Ok(msg)) = stream.next().await {
        let Message::Text(text) = msg else { continue };
        let Ok(req) = serde_json::from_str::<RequestFrame>(&text) else {
            continue;
        };
        let id = req.id.clone().unwrap_or_default();

        if req.method == HANDSHAKE_METHOD {
            handshakes.lock().push(req);
            for text in preamble.iter() {
                let _ = raw_tx.send(text.clone());
            }
            let reply = if accept_handshake {
                ResponseFrame::ok(id, Map::new())
            } else {
                ResponseFrame::error(id, "client not allowed", Some("forbidden"))
            };
            let _ = out_tx.send(reply);
            continue;
        }

        requests.lock().push((conn, req.clone()));
        match behavior(&req, conn) {
            Action::Reply(frame) => {
                let _ = out_tx.send(frame);
            }
            Action::Many(frames) => {
                for frame in frames {
                    let _ = out_tx.send(frame);
                }
            }
            Action::ReplyAfter(delay, frame) => {
                let out_tx = out_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = out_tx.send(frame);
                });
            }
            Action::Close => break,
            Action::Ignore => {}
        }
    }

    writer.abort();
}

#[derive(Clone)]
struct FrameSender(mpsc::UnboundedSender<String>);

impl FrameSender {
    fn send(&self, frame: ResponseFrame) -> Result<(), mpsc::error::SendError<String>> {
        self.0.send(serde_json::to_string(&frame).unwrap())
    }
}

/// Reply `{ success: true, ...fields }` to `req`.
pub fn ok(req: &RequestFrame, fields: Value) -> ResponseFrame {
    let fields = match fields {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    ResponseFrame::ok(req.id.clone().unwrap_or_default(), fields)
}

/// Echo the request params back as result fields.
pub fn echo(req: &RequestFrame) -> ResponseFrame {
    ResponseFrame::ok(req.id.clone().unwrap_or_default(), req.params.clone())
}

/// A client tuned for fast tests against `port`.
pub fn client_for(port: u16) -> BridgeClient {
    builder_for(port).build().unwrap()
}

pub fn builder_for(port: u16) -> BridgeClientBuilder {
    BridgeClientBuilder::new()
        .host("127.0.0.1", port)
        .client_id("test-agent")
        .handshake_timeout(Duration::from_secs(2))
        .request_timeout(Duration::from_secs(5))
        .reconnect_backoff(ReconnectBackoff {
            initial_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(50),
            backoff_factor: 2.0,
            max_attempts: 3,
        })
        .retry_policy(RetryPolicy {
            max_retries: 3,
            recovery_delay: Duration::from_millis(50),
            retry_undelivered: true,
        })
}

pub fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
