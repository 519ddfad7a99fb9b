//! Batch queue configuration

use serde::{Deserialize, Serialize};

use crate::error::QueueError;

/// Batch queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Max in-flight dispatch cycles (running plus buffered) before `add`
    /// declines to request another and leaves draining to the cycles
    /// already under way
    #[serde(default = "default_max_pending_dispatches")]
    pub max_pending_dispatches: usize,
}

fn default_max_pending_dispatches() -> usize {
    3
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_pending_dispatches: default_max_pending_dispatches(),
        }
    }
}

impl BatchConfig {
    /// A zero cap would suppress every dispatch cycle; reject it up front.
    pub(crate) fn validate(&self) -> Result<(), QueueError> {
        if self.max_pending_dispatches == 0 {
            return Err(QueueError::InvalidDispatchCap { given: 0 });
        }
        Ok(())
    }
}
