//! Heartbeat configuration for the emotion state
//!
//! The heartbeat decays intensity even without any input.

use lumi_core::config::EmotionConfig;
use std::time::Duration;

/// Configuration for the decay heartbeat
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// How often intensity decays (default: 1s)
    pub interval: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

impl HeartbeatConfig {
    pub fn from_config(cfg: &EmotionConfig) -> Self {
        Self {
            interval: Duration::from_secs(cfg.tick_secs.max(1)),
        }
    }

    /// Very fast heartbeat for testing
    pub fn testing() -> Self {
        Self {
            interval: Duration::from_millis(10),
        }
    }
}
