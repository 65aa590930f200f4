// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Event loop configuration.
//!
//! Supports both programmatic and file-based configuration.
//!
//! ```toml
//! event_blocks = 4
//! events_per_block = 24
//! low_priority_evict_target = 4
//! latency_warn_threshold_ms = 1000
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::nanoapp::API_VERSION_1_1;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Event loop configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLoopConfig {
    /// Maximum number of event pool blocks.
    #[serde(default = "default_event_blocks")]
    pub event_blocks: usize,

    /// Events per pool block.
    #[serde(default = "default_events_per_block")]
    pub events_per_block: usize,

    /// How many low-priority system events to evict to make room for one
    /// high-priority event.
    #[serde(default = "default_evict_target")]
    pub low_priority_evict_target: usize,

    /// Dispatch latency that triggers a warning (milliseconds).
    #[serde(default = "default_latency_warn")]
    pub latency_warn_threshold_ms: u32,

    /// Latency warning throttle window (milliseconds).
    #[serde(default = "default_throttle_interval")]
    pub throttle_interval_ms: u64,

    /// Latency warnings allowed per throttle window.
    #[serde(default = "default_throttle_count")]
    pub throttle_count: u32,

    /// Host wakeup bucket duration (seconds).
    #[serde(default = "default_wakeup_interval")]
    pub wakeup_bucket_interval_secs: u64,

    /// Host wakeup buckets kept per nanoapp.
    #[serde(default = "default_wakeup_buckets")]
    pub wakeup_bucket_count: usize,

    /// Oldest nanoapp target API version accepted at load.
    #[serde(default = "default_first_api_version")]
    pub first_supported_api_version: u32,
}

fn default_event_blocks() -> usize {
    4
}

fn default_events_per_block() -> usize {
    24
}

fn default_evict_target() -> usize {
    4
}

fn default_latency_warn() -> u32 {
    1000
}

fn default_throttle_interval() -> u64 {
    1000
}

fn default_throttle_count() -> u32 {
    10
}

fn default_wakeup_interval() -> u64 {
    300
}

fn default_wakeup_buckets() -> usize {
    4
}

fn default_first_api_version() -> u32 {
    API_VERSION_1_1
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self {
            event_blocks: default_event_blocks(),
            events_per_block: default_events_per_block(),
            low_priority_evict_target: default_evict_target(),
            latency_warn_threshold_ms: default_latency_warn(),
            throttle_interval_ms: default_throttle_interval(),
            throttle_count: default_throttle_count(),
            wakeup_bucket_interval_secs: default_wakeup_interval(),
            wakeup_bucket_count: default_wakeup_buckets(),
            first_supported_api_version: default_first_api_version(),
        }
    }
}

impl EventLoopConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Small pool, handy for exercising backpressure.
    pub fn with_pool(mut self, event_blocks: usize, events_per_block: usize) -> Self {
        self.event_blocks = event_blocks;
        self.events_per_block = events_per_block;
        self
    }

    pub fn event_capacity(&self) -> usize {
        self.event_blocks.saturating_mul(self.events_per_block)
    }

    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.throttle_interval_ms)
    }

    pub fn wakeup_bucket_interval(&self) -> Duration {
        Duration::from_secs(self.wakeup_bucket_interval_secs)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_blocks == 0 || self.events_per_block == 0 {
            return Err(ConfigError::Invalid(
                "event_blocks and events_per_block must be non-zero".into(),
            ));
        }
        if self.event_capacity() > usize::from(u16::MAX) {
            return Err(ConfigError::Invalid(format!(
                "Event pool capacity {} exceeds {}",
                self.event_capacity(),
                u16::MAX
            )));
        }
        if self.wakeup_bucket_count == 0 {
            return Err(ConfigError::Invalid(
                "wakeup_bucket_count must be non-zero".into(),
            ));
        }
        if self.wakeup_bucket_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "wakeup_bucket_interval_secs must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
