//! Worker pool configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Name prefix for worker threads
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,

    /// How long an idle worker waits for more work before retiring, in seconds
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

fn default_thread_name_prefix() -> String {
    "wq-worker".to_string()
}

fn default_keep_alive_secs() -> u64 {
    30
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            thread_name_prefix: default_thread_name_prefix(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

impl PoolConfig {
    /// Get the idle keep-alive as a Duration
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}
