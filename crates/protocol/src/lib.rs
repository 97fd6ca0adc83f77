//! Wire protocol between the bridge client and the editor host.
//!
//! A single persistent WebSocket carries JSON text frames of one shape in
//! each direction:
//!
//! ```text
//! client → host   { "id"?: string, "method": string, "params": object }
//! host → client   { "id"?: string, "success": bool, "message"?: string,
//!                   "error"?: string, ...result fields }
//! ```
//!
//! The `id` is the only correlation key.  A frame without one is a
//! fire-and-forget request (outbound) or a host notification (inbound).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Bumped on any breaking change to the frame shapes or handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// Method name of the first frame sent on every new connection.
pub const HANDSHAKE_METHOD: &str = "handshake";

/// Inbound frames larger than this are dropped before parsing.
pub const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Frames
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Client → host: invoke `method` with `params`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub method: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl RequestFrame {
    pub fn new(id: impl Into<String>, method: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            id: Some(id.into()),
            method: method.into(),
            params,
        }
    }

    /// A request the host must not answer.
    pub fn fire_and_forget(method: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            id: None,
            method: method.into(),
            params,
        }
    }

    /// The handshake that opens every connection.
    pub fn handshake(id: impl Into<String>, client_id: &str) -> Self {
        let mut params = Map::new();
        params.insert("client_id".into(), Value::String(client_id.into()));
        params.insert("protocol_version".into(), Value::from(PROTOCOL_VERSION));
        Self::new(id, HANDSHAKE_METHOD, params)
    }
}

/// Host → client: outcome of a request, or a notification when `id` is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Machine-readable failure kind, set only when `success` is false.
    #[serde(default, rename = "error", skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    /// Every other top-level field the host returned.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ResponseFrame {
    pub fn ok(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: Some(id.into()),
            success: true,
            message: None,
            error_kind: None,
            fields,
        }
    }

    pub fn error(
        id: impl Into<String>,
        message: impl Into<String>,
        kind: Option<&str>,
    ) -> Self {
        Self {
            id: Some(id.into()),
            success: false,
            message: Some(message.into()),
            error_kind: kind.map(str::to_string),
            fields: Map::new(),
        }
    }

    /// `true` for host-originated frames that answer no request.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Parse one inbound text frame.
pub fn parse_inbound(text: &str) -> Result<ResponseFrame, serde_json::Error> {
    serde_json::from_str(text)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error kinds surfaced to callers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Coarse failure class attached to every bridge error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No connection could be established within the attempt bound.
    ConnectionUnavailable,
    /// The connection dropped while a call was outstanding.
    ConnectionLost,
    /// No response inside the call's window.
    Timeout,
    /// The host reported failure.
    HostError,
    /// The tool name is not in the registry.
    UnknownTool,
    /// A frame could not be encoded or decoded.
    Protocol,
    Config,
    Shutdown,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionUnavailable => "connection_unavailable",
            Self::ConnectionLost => "connection_lost",
            Self::Timeout => "timeout",
            Self::HostError => "host_error",
            Self::UnknownTool => "unknown_tool",
            Self::Protocol => "protocol",
            Self::Config => "config",
            Self::Shutdown => "shutdown",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
