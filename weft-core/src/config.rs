//! Engine Configuration
//!
//! Process-wide switches that change how the reactive engine behaves.
//!
//! The only switch today is async batching. With batching enabled (the
//! default), dependency notifications enqueue watchers on the scheduler and a
//! single flush runs on the next tick. With batching disabled, the first
//! enqueue of a burst drains the queue synchronously and `Dep::notify` sorts
//! subscribers by id before notifying, so evaluation order stays
//! deterministic without the scheduler's sort. Disabling batching is meant
//! for tests and debugging, not production use.

use std::sync::atomic::{AtomicBool, Ordering};

static ASYNC_UPDATES: AtomicBool = AtomicBool::new(true);

/// Enable or disable asynchronous update batching.
pub fn set_async(enabled: bool) {
    ASYNC_UPDATES.store(enabled, Ordering::SeqCst);
}

/// Whether updates are batched and flushed asynchronously.
pub fn is_async() -> bool {
    ASYNC_UPDATES.load(Ordering::SeqCst)
}
