//! Retry backoff

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default exponential unit in milliseconds
pub const DEFAULT_BACKOFF_UNIT_MS: u64 = 1_000;
/// Default fixed delay in milliseconds
pub const DEFAULT_FIXED_DELAY_MS: u64 = 5_000;

/// Delay between attempts of one task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum RetryPolicy {
    /// `unit · 2^retry_count`: 2, 4, 8 units for retries 1, 2, 3
    Exponential {
        /// Base unit in milliseconds
        #[serde(default = "default_unit_ms")]
        unit_ms: u64,
    },
    /// Same delay every time
    Fixed {
        /// Delay in milliseconds
        #[serde(default = "default_fixed_ms")]
        delay_ms: u64,
    },
}

fn default_unit_ms() -> u64 {
    DEFAULT_BACKOFF_UNIT_MS
}

fn default_fixed_ms() -> u64 {
    DEFAULT_FIXED_DELAY_MS
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential()
    }
}

impl RetryPolicy {
    /// Exponential backoff with a one second unit
    #[must_use]
    pub fn exponential() -> Self {
        Self::Exponential {
            unit_ms: DEFAULT_BACKOFF_UNIT_MS,
        }
    }

    /// Five second fixed delay
    #[must_use]
    pub fn fixed() -> Self {
        Self::Fixed {
            delay_ms: DEFAULT_FIXED_DELAY_MS,
        }
    }

    /// Delay before the attempt following retry number `retry_count`
    #[must_use]
    pub fn delay(&self, retry_count: u32) -> Duration {
        match *self {
            Self::Exponential { unit_ms } => {
                let factor = 1u64.checked_shl(retry_count).unwrap_or(u64::MAX);
                Duration::from_millis(unit_ms.saturating_mul(factor))
            }
            Self::Fixed { delay_ms } => Duration::from_millis(delay_ms),
        }
    }
}
