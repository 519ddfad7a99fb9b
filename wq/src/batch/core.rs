//! Batch queue implementation

use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::QueueError;
use crate::pool::WorkerPool;
use crate::queue::TaskQueue;

use super::config::BatchConfig;

/// Merge function: folds a new payload into the accumulated list
pub type MergeFn<T> = dyn Fn(Vec<T>, T) -> Vec<T> + Send + Sync;

/// Consumer callback receiving each accumulated batch
pub type ConsumerFn<T> = dyn Fn(Vec<T>) + Send + Sync;

/// Pause probe: while it returns true, dispatch cycles leave payloads intact
pub type PauseFn = dyn Fn() -> bool + Send + Sync;

/// State shared between producer handles and dispatch cycles.
///
/// The payload list has its own lock, independent of the dispatch queue's
/// bookkeeping lock, so a slow consumer (or one that re-enters `add`) never
/// blocks scheduler accounting.
struct BatchShared<T> {
    dispatch_queue: TaskQueue,
    config: BatchConfig,
    payloads: Mutex<Vec<T>>,
    merge: Mutex<Option<Arc<MergeFn<T>>>>,
    consumer: Mutex<Option<Arc<ConsumerFn<T>>>>,
    pause_check: Mutex<Option<Arc<PauseFn>>>,
}

/// Coalesces rapidly-arriving payloads into single consumer invocations.
///
/// Producers `add` payloads; an internal serial queue delivers accumulated
/// batches to the consumer callback in merge order. Payloads added while
/// the consumer runs are picked up by a follow-up cycle, so every payload
/// is delivered exactly once and redundant cycles are skipped.
pub struct BatchQueue<T> {
    shared: Arc<BatchShared<T>>,
}

impl<T> Clone for BatchQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + 'static> BatchQueue<T> {
    /// Create a batch queue with default configuration
    pub fn new(pool: WorkerPool) -> Self {
        Self::build(pool, BatchConfig::default())
    }

    /// Create a batch queue with the given configuration.
    ///
    /// Fails fast when the dispatch-cycle cap is zero.
    pub fn with_config(pool: WorkerPool, config: BatchConfig) -> Result<Self, QueueError> {
        config.validate()?;
        Ok(Self::build(pool, config))
    }

    fn build(pool: WorkerPool, config: BatchConfig) -> Self {
        debug!(?config, "BatchQueue::build: called");
        Self {
            shared: Arc::new(BatchShared {
                dispatch_queue: TaskQueue::single(pool),
                config,
                payloads: Mutex::new(Vec::new()),
                merge: Mutex::new(None),
                consumer: Mutex::new(None),
                pause_check: Mutex::new(None),
            }),
        }
    }

    /// Merge a payload into the pending list and request a dispatch cycle.
    ///
    /// Never blocks beyond the payload lock; the merge function runs under
    /// that lock and should stay cheap.
    pub fn add(&self, payload: T) {
        {
            let mut payloads = self.shared.payloads.lock();
            let merge = self.shared.merge.lock().clone();
            let list = mem::take(&mut *payloads);
            *payloads = match merge {
                Some(merge) => (*merge)(list, payload),
                None => {
                    let mut list = list;
                    list.push(payload);
                    list
                }
            };
        }
        debug!("BatchQueue::add: payload merged");
        request_dispatch(&self.shared);
    }

    /// Install the merge function applied by `add`
    pub fn set_merge_function<F>(&self, merge: F)
    where
        F: Fn(Vec<T>, T) -> Vec<T> + Send + Sync + 'static,
    {
        *self.shared.merge.lock() = Some(Arc::new(merge));
    }

    /// Restore the default appending merge
    pub fn clear_merge_function(&self) {
        *self.shared.merge.lock() = None;
    }

    /// Install the consumer and flush anything already pending
    pub fn set_consumer<F>(&self, consumer: F)
    where
        F: Fn(Vec<T>) + Send + Sync + 'static,
    {
        *self.shared.consumer.lock() = Some(Arc::new(consumer));
        debug!("BatchQueue::set_consumer: installed");
        request_dispatch(&self.shared);
    }

    /// Install the pause probe consulted before each delivery
    pub fn set_pause_check<F>(&self, check: F)
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        *self.shared.pause_check.lock() = Some(Arc::new(check));
    }

    /// Whether deliveries are currently suspended
    pub fn is_paused(&self) -> bool {
        self.shared.is_paused()
    }

    /// Re-request a dispatch cycle after a pause ends.
    ///
    /// Payloads accumulated while paused are delivered in their original
    /// merge order.
    pub fn resume(&self) {
        debug!("BatchQueue::resume: called");
        request_dispatch(&self.shared);
    }

    /// Payloads merged but not yet handed to the consumer
    pub fn pending_count(&self) -> usize {
        self.shared.payloads.lock().len()
    }
}

impl<T> BatchShared<T> {
    fn is_paused(&self) -> bool {
        let check = self.pause_check.lock().clone();
        check.map(|check| (*check)()).unwrap_or(false)
    }
}

/// Request a dispatch cycle, cancelling stale buffered ones.
///
/// A newly enqueued cycle observes at least the payloads any buffered one
/// would, so buffered cycles are skipped rather than run redundantly. When
/// the in-flight cap is hit the request is declined; the payload is already
/// merged and the cycles under way will drain it.
fn request_dispatch<T: Send + 'static>(shared: &Arc<BatchShared<T>>) {
    let pending = shared.dispatch_queue.running_count() + shared.dispatch_queue.waiting_count();
    if pending > shared.config.max_pending_dispatches {
        debug!(pending, "BatchQueue::request_dispatch: cycle cap reached");
        return;
    }

    shared.dispatch_queue.skip_buffered();
    let shared = Arc::clone(shared);
    shared.dispatch_queue.clone().enqueue(move || run_dispatch(&shared));
}

/// One dispatch cycle: swap out the pending list and deliver it.
fn run_dispatch<T: Send + 'static>(shared: &Arc<BatchShared<T>>) {
    let Some(consumer) = shared.consumer.lock().clone() else {
        debug!("BatchQueue::run_dispatch: consumer not set");
        return;
    };

    if shared.is_paused() {
        debug!("BatchQueue::run_dispatch: paused");
        return;
    }

    let batch = mem::take(&mut *shared.payloads.lock());
    if batch.is_empty() {
        return;
    }

    debug!(len = batch.len(), "BatchQueue::run_dispatch: delivering batch");
    (*consumer)(batch);

    // Payloads added while the consumer ran need a follow-up cycle
    request_dispatch(shared);
}
