//! Bounded queue implementation

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::QueueError;
use crate::pool::WorkerPool;
use crate::work::{BoxedWorkItem, WorkItem};

use super::task::Task;

/// Counters and buffers protected by the queue lock
struct QueueInner {
    /// Concurrently running cap, always > 0
    max_concurrency: usize,

    /// Items currently dispatched and not yet completed
    running_count: usize,

    /// Items currently buffered
    waiting_count: usize,

    /// Pending task wrappers in dispatch order
    buffer: VecDeque<Arc<Task>>,

    /// Ids of currently running task wrappers
    running: HashSet<u64>,
}

/// Shared queue state behind the cloneable handle
struct QueueShared {
    pool: WorkerPool,
    inner: Mutex<QueueInner>,

    /// Source for reconciliation tokens
    token_seq: AtomicU64,

    /// Token of the most recent reconciliation request. A drain loop that
    /// no longer holds the current token stops advancing.
    current_token: AtomicU64,

    /// Source for task wrapper ids
    task_seq: AtomicU64,
}

/// An admission-controlled task queue over a shared [`WorkerPool`].
///
/// Each queue enforces an independent concurrency cap: at most
/// `max_concurrency` of its work items run at once, regardless of pool
/// capacity. Excess items buffer in submission order and dispatch FIFO as
/// running items complete.
///
/// The handle is cheaply cloneable; clones share the same queue.
#[derive(Clone)]
pub struct TaskQueue {
    shared: Arc<QueueShared>,
}

impl TaskQueue {
    /// Create a queue running at most `max_concurrency` items at once.
    ///
    /// Fails fast when `max_concurrency` is zero.
    pub fn new(pool: WorkerPool, max_concurrency: usize) -> Result<Self, QueueError> {
        debug!(max_concurrency, "TaskQueue::new: called");
        if max_concurrency == 0 {
            return Err(QueueError::InvalidMaxConcurrency { given: max_concurrency });
        }
        Ok(Self::with_valid(pool, max_concurrency))
    }

    /// Serial queue, used as the dispatch backbone of batch queues
    pub(crate) fn single(pool: WorkerPool) -> Self {
        Self::with_valid(pool, 1)
    }

    fn with_valid(pool: WorkerPool, max_concurrency: usize) -> Self {
        Self {
            shared: Arc::new(QueueShared {
                pool,
                inner: Mutex::new(QueueInner {
                    max_concurrency,
                    running_count: 0,
                    waiting_count: 0,
                    buffer: VecDeque::new(),
                    running: HashSet::new(),
                }),
                token_seq: AtomicU64::new(0),
                current_token: AtomicU64::new(0),
                task_seq: AtomicU64::new(0),
            }),
        }
    }

    /// Admit a work item at the buffer tail.
    ///
    /// Runs immediately when under the concurrency cap, otherwise buffers
    /// behind earlier submissions.
    pub fn enqueue(&self, item: impl WorkItem + 'static) {
        self.enqueue_boxed(Box::new(item), false);
    }

    /// Admit a work item at the buffer head.
    ///
    /// The escape hatch for priority insertion: FIFO order is broken only
    /// for this one insertion.
    pub fn enqueue_front(&self, item: impl WorkItem + 'static) {
        self.enqueue_boxed(Box::new(item), true);
    }

    fn enqueue_boxed(&self, item: BoxedWorkItem, front: bool) {
        let task_id = self.shared.task_seq.fetch_add(1, Ordering::Relaxed);
        let task = Arc::new(Task::new(task_id, item));

        let dispatch_now = {
            let mut inner = self.shared.inner.lock();
            if inner.running_count < inner.max_concurrency {
                inner.running_count += 1;
                inner.running.insert(task.id());
                true
            } else {
                inner.waiting_count += 1;
                if front {
                    inner.buffer.push_front(Arc::clone(&task));
                } else {
                    inner.buffer.push_back(Arc::clone(&task));
                }
                false
            }
        };

        if dispatch_now {
            debug!(task_id, "TaskQueue::enqueue: admitted immediately");
            dispatch(&self.shared, task);
        } else {
            debug!(task_id, front, "TaskQueue::enqueue: buffered");
        }
    }

    /// Mark every buffered item so its body is bypassed.
    ///
    /// Skipped items still transit dispatch and completion bookkeeping when
    /// their turn arrives; later submissions join behind them as usual.
    pub fn skip_buffered(&self) {
        let inner = self.shared.inner.lock();
        debug!(buffered = inner.buffer.len(), "TaskQueue::skip_buffered: called");
        for task in &inner.buffer {
            task.set_skip();
        }
    }

    /// Update the concurrency cap.
    ///
    /// Zero is deliberately ignored, as are unchanged values. Growing the
    /// cap admits buffered items up to the new limit.
    pub fn set_max_concurrency(&self, max_concurrency: usize) {
        if max_concurrency == 0 {
            debug!("TaskQueue::set_max_concurrency: zero ignored");
            return;
        }
        {
            let mut inner = self.shared.inner.lock();
            if inner.max_concurrency == max_concurrency {
                return;
            }
            debug!(
                from = inner.max_concurrency,
                to = max_concurrency,
                "TaskQueue::set_max_concurrency: updated"
            );
            inner.max_concurrency = max_concurrency;
        }
        reconcile(&self.shared);
    }

    /// Current concurrency cap
    pub fn max_concurrency(&self) -> usize {
        self.shared.inner.lock().max_concurrency
    }

    /// Items currently dispatched and not yet completed
    pub fn running_count(&self) -> usize {
        self.shared.inner.lock().running_count
    }

    /// Items currently buffered
    pub fn waiting_count(&self) -> usize {
        self.shared.inner.lock().waiting_count
    }

    /// Snapshot of the queue counters for diagnostics
    pub fn state(&self) -> QueueState {
        let inner = self.shared.inner.lock();
        QueueState {
            running: inner.running_count,
            waiting: inner.waiting_count,
            max_concurrency: inner.max_concurrency,
        }
    }
}

/// Queue counter snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueState {
    pub running: usize,
    pub waiting: usize,
    pub max_concurrency: usize,
}

/// Hand a task to the pool; completion bookkeeping follows the body.
fn dispatch(shared: &Arc<QueueShared>, task: Arc<Task>) {
    let shared = Arc::clone(shared);
    let pool = shared.pool.clone();
    pool.submit_boxed(Box::new(move || {
        task.execute();
        complete(&shared, task.id());
    }));
}

/// Completion bookkeeping; runs exactly once per dispatched task.
fn complete(shared: &Arc<QueueShared>, task_id: u64) {
    {
        let mut inner = shared.inner.lock();
        inner.running_count -= 1;
        if !inner.running.remove(&task_id) {
            warn!(task_id, "TaskQueue: completed task missing from running set");
        }
    }
    debug!(task_id, "TaskQueue: task completed");
    reconcile(shared);
}

/// Request a drain of the buffer into available capacity.
///
/// The drain loop runs on the pool and admits one buffered item per lock
/// acquisition; the lock is never held across a pool submit. A newer
/// reconciliation supersedes the token, stopping older loops.
fn reconcile(shared: &Arc<QueueShared>) {
    let token = shared.token_seq.fetch_add(1, Ordering::SeqCst) + 1;
    shared.current_token.store(token, Ordering::SeqCst);
    debug!(token, "TaskQueue::reconcile: requested");

    let shared = Arc::clone(shared);
    let pool = shared.pool.clone();
    pool.submit_boxed(Box::new(move || {
        while shared.current_token.load(Ordering::SeqCst) == token && admit_one(&shared) {}
    }));
}

/// Admit the buffer head when under the cap; false when nothing to admit.
fn admit_one(shared: &Arc<QueueShared>) -> bool {
    let admitted = {
        let mut inner = shared.inner.lock();
        if inner.running_count >= inner.max_concurrency {
            None
        } else if let Some(task) = inner.buffer.pop_front() {
            inner.waiting_count -= 1;
            inner.running_count += 1;
            inner.running.insert(task.id());
            Some(task)
        } else {
            None
        }
    };

    match admitted {
        Some(task) => {
            debug!(task_id = task.id(), "TaskQueue::admit_one: dispatching buffered task");
            dispatch(shared, task);
            true
        }
        None => false,
    }
}
