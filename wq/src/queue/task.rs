//! Task wrapper

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::work::BoxedWorkItem;

/// A work item wrapped with queue bookkeeping identity and a skip flag.
///
/// The wrapper transits dispatch exactly once; whether the body runs,
/// panics, or is skipped, the owning queue's completion bookkeeping follows.
pub(super) struct Task {
    id: u64,
    skip: AtomicBool,
    body: Mutex<Option<BoxedWorkItem>>,
}

impl Task {
    pub(super) fn new(id: u64, body: BoxedWorkItem) -> Self {
        Self {
            id,
            skip: AtomicBool::new(false),
            body: Mutex::new(Some(body)),
        }
    }

    pub(super) fn id(&self) -> u64 {
        self.id
    }

    /// Mark the task so its body is bypassed when its turn arrives
    pub(super) fn set_skip(&self) {
        self.skip.store(true, Ordering::SeqCst);
    }

    /// Run the body unless skipped, containing any panic.
    pub(super) fn execute(&self) {
        if self.skip.load(Ordering::SeqCst) {
            debug!(task_id = self.id, "Task::execute: skipped");
            return;
        }

        let Some(body) = self.body.lock().take() else {
            return;
        };

        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| body.run())) {
            error!(
                task_id = self.id,
                panic = panic_message(payload.as_ref()),
                "Task::execute: work item panicked"
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_execute_runs_body() {
        let ran = Arc::new(AtomicUsize::new(0));
        let cloned = Arc::clone(&ran);
        let task = Task::new(1, Box::new(move || {
            cloned.fetch_add(1, Ordering::SeqCst);
        }));

        task.execute();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_skipped_body_never_runs() {
        let ran = Arc::new(AtomicUsize::new(0));
        let cloned = Arc::clone(&ran);
        let task = Task::new(1, Box::new(move || {
            cloned.fetch_add(1, Ordering::SeqCst);
        }));

        task.set_skip();
        task.execute();
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_panic_is_contained() {
        let task = Task::new(1, Box::new(|| panic!("boom")));

        // Must not propagate
        task.execute();
    }
}
