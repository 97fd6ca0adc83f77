use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Host endpoint
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where the editor host listens and how this client identifies itself.
///
/// Read once per connection attempt; a running connection never re-reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_port")]
    pub port: u16,
    /// WebSocket path on the host listener.
    #[serde(default = "d_path")]
    pub path: String,
    /// Identity announced in the handshake.
    #[serde(default = "d_client_id")]
    pub client_id: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            port: d_port(),
            path: d_path(),
            client_id: d_client_id(),
        }
    }
}

impl HostConfig {
    /// The `ws://` URL for this endpoint.
    pub fn ws_url(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("ws://{}:{}{}", self.host, self.port, path)
    }
}

fn d_host() -> String {
    "127.0.0.1".into()
}

fn d_port() -> u16 {
    6400
}

fn d_path() -> String {
    "/".into()
}

fn d_client_id() -> String {
    "editor-bridge".into()
}
