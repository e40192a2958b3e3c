//! Reconnection backoff policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounded exponential backoff without jitter.
///
/// `delay(n) = min(base * multiplier^n, max)`, so the delay never decreases
/// as `n` grows and never exceeds the cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconnectPolicy {
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound for any delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Growth factor per attempt. Values below 1.0 are treated as 1.0.
    pub multiplier: f64,
    /// Stop auto-retrying after this many consecutive attempts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            multiplier: 2.0,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Caps the number of consecutive automatic attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = Some(n);
        self
    }

    /// Sets base and maximum delay.
    #[must_use]
    pub fn with_delays(mut self, base: Duration, max: Duration) -> Self {
        self.base_delay_ms = duration_ms(base);
        self.max_delay_ms = duration_ms(max);
        self
    }

    /// Delay before retry number `attempt` (0-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay_ms.min(self.max_delay_ms) as f64;
        let factor = self.multiplier.max(1.0);
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = base * factor.powi(exp);
        let capped = scaled.min(self.max_delay_ms as f64);
        Duration::from_millis(capped as u64)
    }

    /// Whether another automatic attempt is allowed after `attempt` tries.
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempt < max,
            None => true,
        }
    }

    /// Minimum delay; what the schedule resets to.
    #[must_use]
    pub fn min_delay(&self) -> Duration {
        self.delay_for_attempt(0)
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
