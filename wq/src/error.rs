//! Scheduler error types

use thiserror::Error;

/// Errors raised when constructing scheduler components
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("max concurrency must be > 0, got {given}")]
    InvalidMaxConcurrency { given: usize },

    #[error("max pending dispatch cycles must be > 0, got {given}")]
    InvalidDispatchCap { given: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_max_concurrency_message() {
        let err = QueueError::InvalidMaxConcurrency { given: 0 };

        let msg = err.to_string();
        assert!(msg.contains("max concurrency"));
        assert!(msg.contains("0"));
    }

    #[test]
    fn test_invalid_dispatch_cap_message() {
        let err = QueueError::InvalidDispatchCap { given: 0 };

        let msg = err.to_string();
        assert!(msg.contains("dispatch cycles"));
    }
}
