use serde::{Deserialize, Serialize};

/// Default `tracing` filter, used when `RUST_LOG` is unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "d_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: d_filter() }
    }
}

fn d_filter() -> String {
    "warn".into()
}
