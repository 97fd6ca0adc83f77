//! Delays between socket attempts inside one `connect` cycle.
//!
//! A script reload is absorbed by the retry layer's recovery delay.  A
//! cycle that reaches this schedule has already failed once, so the host
//! is treated as restarting: the first pause starts above the recovery
//! delay and grows geometrically up to a cap.

use std::time::Duration;

use eb_domain::config::ReconnectConfig;

/// Growth stops after this many steps; the cap is reached long before.
const MAX_GROWTH_STEPS: u32 = 31;

#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    /// Pause after the first failed attempt.
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Growth per failure.  Values below `1.0` are treated as `1.0`.
    pub backoff_factor: f64,
    /// Failed attempts before `connect` reports the host unavailable.
    /// `0` keeps trying forever.
    pub max_attempts: u32,
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::from_config(&ReconnectConfig::default())
    }
}

impl ReconnectBackoff {
    pub fn from_config(cfg: &ReconnectConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(cfg.initial_delay_ms),
            max_delay: Duration::from_millis(cfg.max_delay_ms),
            backoff_factor: cfg.backoff_factor,
            max_attempts: cfg.max_attempts,
        }
    }

    /// Pause after `failures` consecutive failed attempts (1-based).
    pub fn delay_after(&self, failures: u32) -> Duration {
        let cap = self.max_delay.max(self.initial_delay);
        let step = failures.saturating_sub(1).min(MAX_GROWTH_STEPS);
        let factor = if self.backoff_factor.is_finite() {
            self.backoff_factor.max(1.0)
        } else {
            1.0
        };
        let secs = self.initial_delay.as_secs_f64() * factor.powi(step as i32);
        Duration::try_from_secs_f64(secs).map_or(cap, |d| d.min(cap))
    }

    pub fn should_give_up(&self, failures: u32) -> bool {
        self.max_attempts > 0 && failures >= self.max_attempts
    }

    /// Total time a failing `connect` spends sleeping before it gives up.
    /// `None` when attempts are unlimited.
    pub fn worst_case_wait(&self) -> Option<Duration> {
        if self.max_attempts == 0 {
            return None;
        }
        Some((1..self.max_attempts).map(|n| self.delay_after(n)).sum())
    }

    /// Whether the first reconnect pause is longer than a reload recovery
    /// pause of `recovery`.
    pub fn outlasts_recovery(&self, recovery: Duration) -> bool {
        self.initial_delay > recovery
    }
}
