use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::device::classify::Classifier;
use crate::device::constants::{
    CONNECT_RETRY_DELAY, HEART_RATE_MARKER, PAUSE_POLL_DELAY, POWER_SOURCE_MARKER, SWEEP_DELAY,
};
use crate::device::types::{RetryPolicy, ScanTiming};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryConfig {
    /// Consecutive failed attempts before a connector gives up on a device;
    /// absent means retry forever.
    pub max_attempts: Option<u32>,
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig { max_attempts: None, backoff_ms: CONNECT_RETRY_DELAY }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub heart_rate_marker: String,
    pub power_source_marker: String,
    pub sweep_delay_ms: u64,
    pub pause_poll_ms: u64,
    pub retry: RetryConfig,
}

impl Config {
    pub fn classifier(&self) -> Classifier {
        Classifier::new(self.heart_rate_marker.clone(), self.power_source_marker.clone())
    }

    pub fn scan_timing(&self) -> ScanTiming {
        ScanTiming {
            sweep_delay: Duration::from_millis(self.sweep_delay_ms),
            pause_poll: Duration::from_millis(self.pause_poll_ms),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            backoff: Duration::from_millis(self.retry.backoff_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            heart_rate_marker: HEART_RATE_MARKER.to_string(),
            power_source_marker: POWER_SOURCE_MARKER.to_string(),
            sweep_delay_ms: SWEEP_DELAY,
            pause_poll_ms: PAUSE_POLL_DELAY,
            retry: RetryConfig::default(),
        }
    }
}
