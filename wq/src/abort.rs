//! Cooperative abort signals
//!
//! Work items already handed to the pool cannot be interrupted; a
//! long-running body polls an [`AbortSignal`] between steps and bails out
//! early. [`check`] turns a raised signal into an error for `?`-style
//! propagation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use thiserror::Error;

/// Raised by [`check`] when the observed signal has aborted
#[derive(Debug, Error)]
#[error("operation aborted")]
pub struct AbortError;

/// The ability to observe that an operation in progress should stop
pub trait AbortSignal {
    fn is_aborted(&self) -> bool;
}

/// Flag-backed abort signal; aborting is permanent
#[derive(Debug, Default)]
pub struct SimpleAbortSignal {
    aborted: AtomicBool,
}

impl SimpleAbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }
}

impl AbortSignal for SimpleAbortSignal {
    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

/// Observes a shared signal without keeping it alive.
///
/// Reports aborted once the referent is dropped or has itself aborted, and
/// latches: once aborted, always aborted. Detached background work holding
/// one of these stops when its owner goes away.
pub struct WeakAbortSignal {
    aborted: AtomicBool,
    target: Weak<dyn AbortSignal + Send + Sync>,
}

impl WeakAbortSignal {
    pub fn new<S>(target: &Arc<S>) -> Self
    where
        S: AbortSignal + Send + Sync + 'static,
    {
        let target: Arc<dyn AbortSignal + Send + Sync> = Arc::clone(target) as _;
        Self {
            aborted: AtomicBool::new(false),
            target: Arc::downgrade(&target),
        }
    }
}

impl AbortSignal for WeakAbortSignal {
    fn is_aborted(&self) -> bool {
        if self.aborted.load(Ordering::SeqCst) {
            return true;
        }

        match self.target.upgrade() {
            None => {
                self.aborted.store(true, Ordering::SeqCst);
                true
            }
            Some(target) => {
                if target.is_aborted() {
                    self.aborted.store(true, Ordering::SeqCst);
                    true
                } else {
                    false
                }
            }
        }
    }
}

/// Bail out with `?` when the signal has aborted
pub fn check(signal: &impl AbortSignal) -> Result<(), AbortError> {
    if signal.is_aborted() { Err(AbortError) } else { Ok(()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_signal_latches() {
        let signal = SimpleAbortSignal::new();
        assert!(!signal.is_aborted());

        signal.abort();
        assert!(signal.is_aborted());
        assert!(signal.is_aborted());
    }

    #[test]
    fn test_weak_signal_follows_target() {
        let target = Arc::new(SimpleAbortSignal::new());
        let weak = WeakAbortSignal::new(&target);

        assert!(!weak.is_aborted());
        target.abort();
        assert!(weak.is_aborted());
    }

    #[test]
    fn test_weak_signal_aborts_when_target_dropped() {
        let target = Arc::new(SimpleAbortSignal::new());
        let weak = WeakAbortSignal::new(&target);

        assert!(!weak.is_aborted());
        drop(target);
        assert!(weak.is_aborted());
    }

    #[test]
    fn test_check_propagates() {
        let signal = SimpleAbortSignal::new();
        assert!(check(&signal).is_ok());

        signal.abort();
        assert!(check(&signal).is_err());
    }
}
