//! Tick Runner
//!
//! The "tick" is the deferral boundary for async batching: callbacks handed
//! to [`next_tick`] accumulate until a drain task runs them, so all writes
//! made synchronously in between collapse into a single flush.
//!
//! The drain is spawned on the current tokio runtime when one is available,
//! and on a plain thread otherwise. The pending flag flips back *before* the
//! drained callbacks run, so a callback can schedule another tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use parking_lot::Mutex;

type TickCallback = Box<dyn FnOnce() + Send>;

static PENDING: AtomicBool = AtomicBool::new(false);

fn callbacks() -> &'static Mutex<Vec<TickCallback>> {
    static CALLBACKS: OnceLock<Mutex<Vec<TickCallback>>> = OnceLock::new();
    CALLBACKS.get_or_init(|| Mutex::new(Vec::new()))
}

/// Drain and run the callbacks queued so far.
///
/// The pending flag resets before any callback runs, and only the frozen
/// batch is drained, so callbacks enqueued during the drain land in the next
/// tick instead of extending this one.
fn flush_callbacks() {
    PENDING.store(false, Ordering::SeqCst);
    let batch: Vec<TickCallback> = std::mem::take(&mut *callbacks().lock());
    for cb in batch {
        cb();
    }
}

fn spawn_flush() {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async {
                flush_callbacks();
            });
        }
        Err(_) => {
            std::thread::spawn(flush_callbacks);
        }
    }
}

/// Defer `cb` to the next tick. The first deferral of a tick arms the drain.
pub fn next_tick<F>(cb: F)
where
    F: FnOnce() + Send + 'static,
{
    callbacks().lock().push(Box::new(cb));
    if PENDING
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_ok()
    {
        spawn_flush();
    }
}

/// A receiver resolved on the next tick, after all previously queued
/// callbacks (including any pending flush) have run.
pub fn next_tick_handle() -> tokio::sync::oneshot::Receiver<()> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    next_tick(move || {
        // receiver may have been dropped; nothing to do then
        let _ = tx.send(());
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;
    use std::sync::Arc;

    #[tokio::test]
    async fn callbacks_run_on_next_tick() {
        let hits = Arc::new(AtomicI32::new(0));
        let a = Arc::clone(&hits);
        let b = Arc::clone(&hits);
        next_tick(move || {
            a.fetch_add(1, Ordering::SeqCst);
        });
        next_tick(move || {
            b.fetch_add(1, Ordering::SeqCst);
        });

        next_tick_handle().await.expect("tick");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
