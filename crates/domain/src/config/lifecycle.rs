use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Idle expiry for dynamically activated tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// A tool unused for longer than this is deactivated by the next sweep.
    #[serde(default = "d_300")]
    pub idle_threshold_secs: u64,
    /// How often the sweep runs.
    #[serde(default = "d_60")]
    pub sweep_interval_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            idle_threshold_secs: 300,
            sweep_interval_secs: 60,
        }
    }
}

impl LifecycleConfig {
    pub fn idle_threshold(&self) -> Duration {
        Duration::from_secs(self.idle_threshold_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn d_300() -> u64 {
    300
}

fn d_60() -> u64 {
    60
}
