//! Coordinator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Address prefix that identifies the dashboard's own pages; the
    /// identity fallback admits a registering container whose origin
    /// starts with this prefix
    #[serde(rename = "home-prefix", default = "default_home_prefix")]
    pub home_prefix: String,

    /// Seconds of inactivity before in-memory state is dropped
    #[serde(rename = "idle-timeout-secs", default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Seconds after a submit before an informational status refresh
    #[serde(rename = "idle-refresh-secs", default = "default_idle_refresh_secs")]
    pub idle_refresh_secs: u64,

    /// Channel buffer size for coordinator requests
    #[serde(rename = "channel-buffer", default = "default_channel_buffer")]
    pub channel_buffer: usize,

    /// Channel buffer size for per-surface deliveries
    #[serde(rename = "peer-channel-buffer", default = "default_peer_channel_buffer")]
    pub peer_channel_buffer: usize,
}

fn default_home_prefix() -> String {
    "app://syncpane/".to_string()
}

fn default_idle_timeout_secs() -> u64 {
    30
}

fn default_idle_refresh_secs() -> u64 {
    120
}

fn default_channel_buffer() -> usize {
    256
}

fn default_peer_channel_buffer() -> usize {
    32
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            home_prefix: default_home_prefix(),
            idle_timeout_secs: default_idle_timeout_secs(),
            idle_refresh_secs: default_idle_refresh_secs(),
            channel_buffer: default_channel_buffer(),
            peer_channel_buffer: default_peer_channel_buffer(),
        }
    }
}

impl CoordinatorConfig {
    /// Idle teardown deadline as a Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Idle status-refresh delay as a Duration
    pub fn idle_refresh(&self) -> Duration {
        Duration::from_secs(self.idle_refresh_secs)
    }
}
