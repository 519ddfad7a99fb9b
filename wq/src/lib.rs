//! WorkQueue - bounded-concurrency task scheduling over a shared worker pool
//!
//! A small scheduling subsystem: a shared pool of reusable execution
//! threads, per-queue admission control capping concurrently running work
//! items while preserving submission order, and a batching layer that
//! coalesces rapidly-arriving payloads into single consumer invocations.
//!
//! # Core Concepts
//!
//! - **Shared pool, per-queue caps**: the pool runs anything immediately;
//!   each [`TaskQueue`] independently limits how many of its items run at
//!   once
//! - **Submission order**: buffered items dispatch FIFO, with
//!   [`TaskQueue::enqueue_front`] as the single priority escape hatch
//! - **Cheap backlog discard**: [`TaskQueue::skip_buffered`] turns stale
//!   buffered items into no-ops without disturbing bookkeeping
//! - **Coalesced batches**: [`BatchQueue`] merges payload bursts and
//!   delivers each payload exactly once, in order
//! - **Contained failures**: a panicking work item is caught and logged;
//!   its slot is always released
//!
//! # Modules
//!
//! - [`pool`] - shared worker pool running work items on reusable threads
//! - [`queue`] - admission-controlled bounded queue
//! - [`batch`] - payload-coalescing batch queue
//! - [`work`] - the work item abstraction
//! - [`abort`] - cooperative abort signals
//! - [`error`] - scheduler error types

pub mod abort;
pub mod batch;
pub mod error;
pub mod pool;
pub mod queue;
pub mod work;

// Re-export commonly used types
pub use abort::{AbortError, AbortSignal, SimpleAbortSignal, WeakAbortSignal};
pub use batch::{BatchConfig, BatchQueue};
pub use error::QueueError;
pub use pool::{PoolConfig, WorkerPool};
pub use queue::{QueueState, TaskQueue};
pub use work::WorkItem;
