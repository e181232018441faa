//! Update Scheduling
//!
//! Batches watcher re-runs: notifications during a tick enqueue watchers
//! (deduplicated, id-ordered) and a single flush on the next tick runs them.
//! See [`queue`] for the flush semantics and [`tick`] for the deferral
//! mechanism.

mod queue;
mod tick;

pub use queue::{queue_activated_callback, queue_watcher, MAX_UPDATE_COUNT};
pub use tick::{next_tick, next_tick_handle};
