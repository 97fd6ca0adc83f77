//! Error taxonomy shared by the transport, correlator, retry layer and tools.

use std::time::Duration;

use eb_protocol::ErrorKind;

/// Every failure a bridge call can surface.
#[derive(thiserror::Error, Debug, Clone)]
pub enum BridgeError {
    #[error("host unavailable: {0}")]
    ConnectionUnavailable(String),

    /// The connection dropped before a response arrived.  `delivered` is
    /// `true` once the frame was handed to the socket writer, i.e. the host
    /// may have acted on it.
    #[error("connection lost: {reason}")]
    ConnectionLost { reason: String, delivered: bool },

    #[error("{method} timed out after {}s", after.as_secs_f64())]
    Timeout { method: String, after: Duration },

    #[error("host error: {message}")]
    HostError {
        message: String,
        kind: Option<String>,
    },

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("protocol: {0}")]
    Protocol(String),

    #[error("config: {0}")]
    Config(String),

    #[error("shutdown")]
    Shutdown,
}

impl BridgeError {
    pub(crate) fn not_connected() -> Self {
        Self::ConnectionLost {
            reason: "not connected".into(),
            delivered: false,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConnectionUnavailable(_) => ErrorKind::ConnectionUnavailable,
            Self::ConnectionLost { .. } => ErrorKind::ConnectionLost,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::HostError { .. } => ErrorKind::HostError,
            Self::UnknownTool(_) => ErrorKind::UnknownTool,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::Config(_) => ErrorKind::Config,
            Self::Shutdown => ErrorKind::Shutdown,
        }
    }

    /// Whether the failure came from the host going away (and so may clear
    /// up once it finishes reloading).
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::ConnectionLost { .. })
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Protocol(e.to_string())
    }
}
