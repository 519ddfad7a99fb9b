//! Worker pool implementation

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use tracing::{debug, warn};

use crate::work::{BoxedWorkItem, WorkItem};

use super::config::PoolConfig;

/// Shared pool state behind the cloneable handle
struct PoolInner {
    config: PoolConfig,

    /// Rendezvous hand-off to parked idle workers. A zero-capacity send
    /// succeeds only while a worker is blocked on the receiving side.
    tx: Sender<BoxedWorkItem>,
    rx: Receiver<BoxedWorkItem>,

    /// Work items currently executing a body
    running: AtomicUsize,

    /// Live worker threads, parked or executing
    threads: AtomicUsize,

    /// Id source for worker thread names
    next_worker_id: AtomicUsize,
}

/// A shared pool of reusable execution threads.
///
/// `submit` hands the work item to a parked idle worker when one exists and
/// spawns a fresh worker thread otherwise; it never blocks the caller and
/// never queues. Idle workers retire after the configured keep-alive.
///
/// The handle is cheaply cloneable; clones share the same worker threads.
/// Inject a clone into each queue instead of reaching for a global.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl WorkerPool {
    /// Create a pool with default configuration
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    /// Create a pool with the given configuration
    pub fn with_config(config: PoolConfig) -> Self {
        debug!(?config, "WorkerPool::with_config: called");
        let (tx, rx) = bounded(0);
        Self {
            inner: Arc::new(PoolInner {
                config,
                tx,
                rx,
                running: AtomicUsize::new(0),
                threads: AtomicUsize::new(0),
                next_worker_id: AtomicUsize::new(0),
            }),
        }
    }

    /// Submit a work item for immediate execution.
    ///
    /// A panic escaping the item's body is the caller's responsibility; the
    /// pool only keeps its counters correct. Queue users never hit this:
    /// the task wrapper in [`TaskQueue`](crate::TaskQueue) contains panics
    /// before they reach the pool.
    pub fn submit(&self, item: impl WorkItem + 'static) {
        self.submit_boxed(Box::new(item));
    }

    pub(crate) fn submit_boxed(&self, item: BoxedWorkItem) {
        match self.inner.tx.try_send(item) {
            Ok(()) => {
                debug!("WorkerPool::submit: handed to idle worker");
            }
            Err(err) => {
                debug!("WorkerPool::submit: no idle worker, spawning");
                self.spawn_worker(err.into_inner());
            }
        }
    }

    /// Work items currently executing a body.
    ///
    /// May be lower than [`thread_count`](Self::thread_count): idle workers
    /// linger for the keep-alive window.
    pub fn running_count(&self) -> usize {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Live worker threads, parked or executing
    pub fn thread_count(&self) -> usize {
        self.inner.threads.load(Ordering::SeqCst)
    }

    fn spawn_worker(&self, first: BoxedWorkItem) {
        let inner = Arc::clone(&self.inner);
        let id = inner.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}-{}", inner.config.thread_name_prefix, id);

        self.inner.threads.fetch_add(1, Ordering::SeqCst);
        let spawned = thread::Builder::new()
            .name(name.clone())
            .spawn(move || worker_loop(inner, first));

        if let Err(err) = spawned {
            self.inner.threads.fetch_sub(1, Ordering::SeqCst);
            warn!(%name, %err, "WorkerPool::spawn_worker: thread spawn failed, work item dropped");
        }
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements a counter when dropped, so unwinding still balances it
struct CountGuard<'a> {
    count: &'a AtomicUsize,
}

impl Drop for CountGuard<'_> {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}

fn worker_loop(inner: Arc<PoolInner>, first: BoxedWorkItem) {
    // Balances the increment in spawn_worker, panic included
    let _thread_guard = CountGuard { count: &inner.threads };

    let mut next = Some(first);
    loop {
        if let Some(item) = next.take() {
            run_item(&inner, item);
        }

        match inner.rx.recv_timeout(inner.config.keep_alive()) {
            Ok(item) => next = Some(item),
            Err(RecvTimeoutError::Timeout) => {
                debug!("WorkerPool: idle keep-alive elapsed, worker retiring");
                break;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn run_item(inner: &PoolInner, item: BoxedWorkItem) {
    inner.running.fetch_add(1, Ordering::SeqCst);
    let _guard = CountGuard { count: &inner.running };
    item.run();
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    fn wait_until(what: &str, predicate: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !predicate() {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_submit_runs_item() {
        let pool = WorkerPool::new();
        let (tx, rx) = mpsc::channel();

        pool.submit(move || {
            tx.send(42).unwrap();
        });

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
    }

    #[test]
    fn test_running_count_tracks_in_flight() {
        let pool = WorkerPool::new();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        pool.submit(move || {
            release_rx.recv().unwrap();
        });

        wait_until("item to start", || pool.running_count() == 1);
        release_tx.send(()).unwrap();
        wait_until("item to finish", || pool.running_count() == 0);
    }

    #[test]
    fn test_submit_never_blocks_under_load() {
        let pool = WorkerPool::new();
        let (done_tx, done_rx) = mpsc::channel();

        for i in 0..32 {
            let done_tx = done_tx.clone();
            pool.submit(move || {
                done_tx.send(i).unwrap();
            });
        }
        drop(done_tx);

        let mut seen: Vec<i32> = done_rx.iter().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..32).collect::<Vec<_>>());
    }

    #[test]
    fn test_panicking_item_does_not_break_pool() {
        let pool = WorkerPool::new();

        pool.submit(|| panic!("boom"));

        let (tx, rx) = mpsc::channel();
        // The pool must still accept and run work afterwards
        wait_until("panicked item to unwind", || pool.running_count() == 0);
        pool.submit(move || {
            tx.send(()).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        wait_until("follow-up item to finish", || pool.running_count() == 0);
    }

    #[test]
    fn test_clone_shares_workers() {
        let pool = WorkerPool::new();
        let clone = pool.clone();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        clone.submit(move || {
            release_rx.recv().unwrap();
        });

        wait_until("item to start", || pool.running_count() == 1);
        assert_eq!(clone.running_count(), 1);
        release_tx.send(()).unwrap();
        wait_until("item to finish", || pool.running_count() == 0);
    }
}
