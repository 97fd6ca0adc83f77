//! Pairs each outbound call with its response.
//!
//! Every call gets a fresh UUID and a pending entry holding a oneshot
//! sender.  The dispatch loop feeds inbound frames to [`Correlator::complete`]
//! and disconnects to [`Correlator::fail_generation`].  Whichever path
//! removes the entry first wins; later arrivals find nothing and are
//! dropped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use eb_protocol::{RequestFrame, ResponseFrame};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::error::BridgeError;
use crate::transport::FrameTransport;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Successful host reply: the optional human-readable message plus every
/// result field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HostResponse {
    pub message: Option<String>,
    pub fields: Map<String, Value>,
}

impl HostResponse {
    /// Flatten into one JSON object (`message` included when present).
    pub fn into_value(self) -> Value {
        let mut obj = self.fields;
        if let Some(message) = self.message {
            obj.entry("message").or_insert(Value::String(message));
        }
        Value::Object(obj)
    }

    fn from_frame(frame: ResponseFrame) -> Result<Self, BridgeError> {
        if frame.success {
            Ok(Self {
                message: frame.message,
                fields: frame.fields,
            })
        } else {
            Err(BridgeError::HostError {
                message: frame
                    .message
                    .unwrap_or_else(|| "host reported failure without a message".into()),
                kind: frame.error_kind,
            })
        }
    }
}

enum Completion {
    Response(ResponseFrame),
    Lost(String),
}

struct PendingRequest {
    method: String,
    /// Connection the frame went out on.
    generation: u64,
    created_at: Instant,
    tx: oneshot::Sender<Completion>,
}

type PendingMap = Mutex<HashMap<String, PendingRequest>>;

/// Removes the pending entry when the call returns or its future is
/// dropped, so abandoned and timed-out calls never linger.
struct PendingGuard<'a> {
    pending: &'a PendingMap,
    id: String,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.id);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Correlator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Correlator {
    transport: Arc<dyn FrameTransport>,
    pending: PendingMap,
}

impl Correlator {
    pub fn new(transport: Arc<dyn FrameTransport>) -> Self {
        Self {
            transport,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Send `method` and wait for the matching response.
    ///
    /// Fails with `Timeout` after `timeout`, `ConnectionLost` if the
    /// connection the frame went out on drops first, or `HostError` if
    /// the host answers with `success: false`.
    pub async fn call(
        &self,
        method: &str,
        params: Map<String, Value>,
        timeout: Duration,
    ) -> Result<HostResponse, BridgeError> {
        let generation = self
            .transport
            .connected_generation()
            .ok_or_else(BridgeError::not_connected)?;

        let id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        let prev = self.pending.lock().insert(
            id.clone(),
            PendingRequest {
                method: method.to_string(),
                generation,
                created_at: Instant::now(),
                tx,
            },
        );
        debug_assert!(prev.is_none(), "request id collision: {id}");
        let _guard = PendingGuard {
            pending: &self.pending,
            id: id.clone(),
        };

        // The connection may have dropped between reading the generation
        // and registering; its disconnect event could already be handled.
        if self.transport.connected_generation() != Some(generation) {
            return Err(BridgeError::not_connected());
        }

        let frame = RequestFrame::new(id.clone(), method, params);
        let sent_on = self.transport.send(&frame)?;
        if sent_on != generation {
            if let Some(entry) = self.pending.lock().get_mut(&id) {
                entry.generation = sent_on;
            }
        }
        tracing::debug!(id = %id, method, generation = sent_on, "request sent");

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Completion::Response(frame))) => HostResponse::from_frame(frame),
            Ok(Ok(Completion::Lost(reason))) => Err(BridgeError::ConnectionLost {
                reason,
                delivered: true,
            }),
            Ok(Err(_)) => Err(BridgeError::ConnectionLost {
                reason: "correlator dropped the request".into(),
                delivered: true,
            }),
            Err(_) => {
                tracing::warn!(
                    id = %id,
                    method,
                    timeout_secs = timeout.as_secs_f64(),
                    "request timed out"
                );
                Err(BridgeError::Timeout {
                    method: method.to_string(),
                    after: timeout,
                })
            }
        }
    }

    /// Route a response frame to its waiter.  Returns `false` when no call
    /// is waiting for that id (late, duplicate, or unknown frames).
    pub fn complete(&self, frame: ResponseFrame) -> bool {
        let Some(id) = frame.id.clone() else {
            return false;
        };

        let Some(pending) = self.pending.lock().remove(&id) else {
            tracing::warn!(id = %id, "response for unknown or completed request, dropping");
            return false;
        };

        tracing::debug!(
            id = %id,
            method = %pending.method,
            elapsed_ms = pending.created_at.elapsed().as_millis() as u64,
            success = frame.success,
            "response matched"
        );
        if pending.tx.send(Completion::Response(frame)).is_err() {
            tracing::debug!(id = %id, "caller abandoned request before its response arrived");
        }
        true
    }

    /// Fail every request sent on `generation` or earlier.  Returns how
    /// many were failed.
    pub fn fail_generation(&self, generation: u64, reason: &str) -> usize {
        let failed: Vec<PendingRequest> = {
            let mut pending = self.pending.lock();
            let ids: Vec<String> = pending
                .iter()
                .filter(|(_, p)| p.generation <= generation)
                .map(|(id, _)| id.clone())
                .collect();
            ids.iter().filter_map(|id| pending.remove(id)).collect()
        };

        let count = failed.len();
        for pending in failed {
            let _ = pending.tx.send(Completion::Lost(reason.to_string()));
        }
        if count > 0 {
            tracing::warn!(
                generation,
                failed_requests = count,
                "failed in-flight requests for dropped connection"
            );
        }
        count
    }

    /// Fail everything outstanding (shutdown).
    pub fn fail_all(&self, reason: &str) -> usize {
        self.fail_generation(u64::MAX, reason)
    }

    /// Number of outstanding requests.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}
