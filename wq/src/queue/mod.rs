//! Bounded queue
//!
//! Admission control over the shared worker pool: each queue caps how many
//! of its work items run concurrently, buffers the rest in submission
//! order, and reconciles the buffer into capacity as items complete.

mod core;
mod task;

pub use self::core::{QueueState, TaskQueue};
