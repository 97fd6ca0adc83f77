//! `eb-bridge`: the client half of the editor bridge.
//!
//! Connects an external process to a running editor host over one
//! WebSocket and makes host reloads look like latency rather than failure.
//!
//! # Architecture
//!
//! ```text
//!  caller ──► BridgeClient::call_with(method, params, opts)
//!                 │
//!                 ▼
//!           RetryingCaller ── ConnectionLost? wait recovery delay,
//!                 │             reconnect, resend (bounded)
//!                 ▼
//!            Correlator ───── uuid id ──► pending map (oneshot)
//!                 │                              ▲
//!                 ▼                              │ complete / fail_generation
//!            WsTransport ── socket ──► host      │
//!                 │                              │
//!                 └── TransportEvent ──► dispatch loop
//! ```
//!
//! # Failure classes
//!
//! - `ConnectionUnavailable`: no connection after bounded attempts.
//! - `ConnectionLost`: dropped mid-call; retried when safe.
//! - `Timeout`: surfaced, never retried.
//! - `HostError`: the host said no; surfaced verbatim.

pub mod builder;
pub mod client;
pub mod correlator;
pub mod endpoint;
pub mod error;
pub mod reconnect;
pub mod retry;
pub mod transport;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use builder::BridgeClientBuilder;
pub use client::{BridgeClient, HostCaller};
pub use correlator::{Correlator, HostResponse};
pub use endpoint::{ConfigFileEndpoint, EndpointResolver, StaticEndpoint};
pub use error::BridgeError;
pub use reconnect::ReconnectBackoff;
pub use retry::{CallOptions, RetryPolicy, RetryStats, RetryingCaller};
pub use transport::{ConnectionState, FrameTransport, TransportEvent, TransportSettings, WsTransport};

pub use eb_protocol::{ErrorKind, ResponseFrame};
