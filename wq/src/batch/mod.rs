//! Batch queue
//!
//! Coalesces rapidly-arriving payloads into single consumer invocations,
//! built from one bounded queue running at concurrency 1. Delivery order
//! follows merge order; redundant dispatch cycles are skipped.

mod config;
mod core;

pub use config::BatchConfig;
pub use self::core::{BatchQueue, ConsumerFn, MergeFn, PauseFn};
