//! Work item abstraction
//!
//! A work item is an opaque unit of executable logic with no return value.
//! Ownership moves into whichever queue currently holds the item, then into
//! the worker pool, which consumes it by calling [`WorkItem::run`].

/// A unit of caller-supplied executable logic.
///
/// Implemented for every `FnOnce() + Send` closure, so plain closures can be
/// submitted anywhere a work item is expected.
pub trait WorkItem: Send {
    /// Execute the item, consuming it.
    fn run(self: Box<Self>);
}

impl<F> WorkItem for F
where
    F: FnOnce() + Send,
{
    fn run(self: Box<Self>) {
        (*self)()
    }
}

/// Boxed work item as stored in queues and handed to the pool.
pub(crate) type BoxedWorkItem = Box<dyn WorkItem>;
