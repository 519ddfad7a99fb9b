//! Shared worker pool
//!
//! An unbounded pool of reusable execution threads. The pool runs whatever
//! it is given immediately; capping concurrency is the job of
//! [`TaskQueue`](crate::TaskQueue).

mod config;
mod core;

pub use config::PoolConfig;
pub use self::core::WorkerPool;
