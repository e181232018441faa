//! Watcher Queue
//!
//! Async watchers are not re-run at notify time; they are pushed onto a
//! global queue that is flushed once per tick. The queue deduplicates by
//! watcher id, so a watcher notified by ten deps in one tick still runs
//! once, and the flush sorts by id so watchers run in creation order
//! (computed sources before the consumers created after them).
//!
//! # Mid-flush enqueues
//!
//! A watcher run can itself change state and queue further watchers. Those
//! are spliced into the not-yet-processed tail of the queue at their id
//! position, so ordering holds even for late arrivals. A watcher re-queued
//! while the flush is still processing it is counted; past
//! [`MAX_UPDATE_COUNT`] re-entries it is declared runaway, reported, and
//! individually suppressed for the rest of the flush. Other queued watchers
//! keep running.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use parking_lot::Mutex;

use crate::config;
use crate::error::handle_error;
use crate::reactive::Watcher;
use crate::scheduler::tick::next_tick;

/// How many times a single watcher may re-enter the queue during one flush
/// before it is declared runaway and suppressed.
pub const MAX_UPDATE_COUNT: u32 = 100;

type ActivatedCallback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct SchedulerState {
    queue: Vec<Watcher>,
    has: HashSet<u64>,
    /// Re-entry counts for the current flush.
    circular: HashMap<u64, u32>,
    /// Watchers declared runaway in the current flush.
    suppressed: HashSet<u64>,
    waiting: bool,
    flushing: bool,
    /// Position of the watcher currently being run.
    index: usize,
    /// Callbacks deferred until the flush finishes.
    activated: Vec<ActivatedCallback>,
}

fn state() -> &'static Mutex<SchedulerState> {
    static SCHEDULER: OnceLock<Mutex<SchedulerState>> = OnceLock::new();
    SCHEDULER.get_or_init(|| Mutex::new(SchedulerState::default()))
}

/// Push a watcher onto the flush queue.
///
/// Deduplicated by id. Outside a flush the watcher is appended; during a
/// flush it is spliced into the unprocessed tail at its id position. The
/// first enqueue of a tick arms the flush (on the next tick, or immediately
/// when async batching is disabled).
pub fn queue_watcher(watcher: &Watcher) {
    let id = watcher.id();
    let arm_flush = {
        let mut s = state().lock();
        if s.has.contains(&id) || s.suppressed.contains(&id) {
            return;
        }
        s.has.insert(id);
        if !s.flushing {
            s.queue.push(watcher.clone());
        } else {
            let mut i = s.queue.len();
            while i > s.index && s.queue[i - 1].id() > id {
                i -= 1;
            }
            s.queue.insert(i, watcher.clone());
        }
        if s.waiting {
            false
        } else {
            s.waiting = true;
            true
        }
    };
    if arm_flush {
        if config::is_async() {
            next_tick(flush_scheduler_queue);
        } else {
            flush_scheduler_queue();
        }
    }
}

/// Run every queued watcher in id order, then reset the queue.
pub(crate) fn flush_scheduler_queue() {
    {
        let mut s = state().lock();
        s.flushing = true;
        s.queue.sort_by_key(|w| w.id());
    }

    loop {
        let watcher = {
            let mut s = state().lock();
            if s.index >= s.queue.len() {
                break;
            }
            let watcher = s.queue[s.index].clone();
            s.index += 1;
            s.has.remove(&watcher.id());
            watcher
        };

        // run outside the lock: the watcher may queue more watchers
        if let Some(before) = watcher.before() {
            before();
        }
        if let Err(err) = watcher.run() {
            handle_error(
                &err,
                &format!("scheduled watcher \"{}\"", watcher.expression()),
            );
        }

        // a watcher that re-queued itself while running is circling
        let mut s = state().lock();
        if s.has.contains(&watcher.id()) {
            let count = s.circular.entry(watcher.id()).or_insert(0);
            *count += 1;
            if *count > MAX_UPDATE_COUNT {
                tracing::warn!(
                    target: "weft",
                    watcher = %watcher.expression(),
                    "infinite update loop detected; suppressing watcher for this flush"
                );
                let id = watcher.id();
                // only the re-queued copy sits in the unprocessed tail;
                // touching the prefix would shift `index`
                if let Some(pos) = s.queue.iter().skip(s.index).position(|w| w.id() == id) {
                    let pos = s.index + pos;
                    s.queue.remove(pos);
                }
                s.has.remove(&id);
                s.suppressed.insert(id);
            }
        }
    }

    let activated = {
        let mut s = state().lock();
        s.queue.clear();
        s.has.clear();
        s.circular.clear();
        s.suppressed.clear();
        s.waiting = false;
        s.flushing = false;
        s.index = 0;
        std::mem::take(&mut s.activated)
    };
    for cb in activated {
        cb();
    }
}

/// Run `cb` now, or defer it to the end of the current flush if one is in
/// progress.
pub fn queue_activated_callback<F>(cb: F)
where
    F: FnOnce() + Send + 'static,
{
    {
        let mut s = state().lock();
        if s.flushing {
            s.activated.push(Box::new(cb));
            return;
        }
    }
    cb();
}
