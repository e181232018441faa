//! Dependency Sets and the Evaluation Context
//!
//! A [`Dep`] is an observable point of subscription: the per-field (or
//! per-container) list of watchers to notify when that piece of state
//! changes. Deps and watchers reference each other bidirectionally: a
//! watcher appears in a dep's subscriber list iff the dep appears in the
//! watcher's dependency list. That invariant is maintained by the
//! watcher's two-set collection logic ([`crate::reactive::Watcher::add_dep`]
//! and `cleanup_deps`), not here.
//!
//! # The evaluation context
//!
//! Only one watcher is evaluated at a time on a given thread, but
//! evaluations nest (a parent's evaluation can synchronously trigger a
//! child's), so the "currently evaluating watcher" is a thread-local stack
//! rather than a flat slot. [`push_target`] returns a guard that pops on
//! drop, so the stack is restored on every exit path, including panics.
//!
//! Reads performed while the top of the stack is empty (or the stack itself
//! is empty) register no dependency; [`untracked`] uses this to deliberately
//! suspend collection for a closure.

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::config;
use crate::reactive::watcher::Watcher;

/// Counter for generating unique dep IDs.
static DEP_UID: AtomicU64 = AtomicU64::new(0);

struct DepInner {
    id: u64,
    subs: RwLock<SmallVec<[Watcher; 4]>>,
}

/// An observable dependency set: an ordered list of subscribing watchers
/// plus a notify operation.
#[derive(Clone)]
pub struct Dep {
    inner: Arc<DepInner>,
}

impl Dep {
    pub fn new() -> Dep {
        Dep {
            inner: Arc::new(DepInner {
                id: DEP_UID.fetch_add(1, Ordering::Relaxed),
                subs: RwLock::new(SmallVec::new()),
            }),
        }
    }

    /// Unique, monotonically increasing identifier.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Append a subscriber. Dedup across an evaluation pass is the
    /// watcher's job, not ours.
    pub(crate) fn add_sub(&self, watcher: &Watcher) {
        self.inner.subs.write().push(watcher.clone());
    }

    /// Remove a subscriber by identity. No-op if absent.
    pub(crate) fn remove_sub(&self, watcher: &Watcher) {
        self.inner.subs.write().retain(|sub| sub.id() != watcher.id());
    }

    /// Register this dep with the currently evaluating watcher, if any.
    pub fn depend(&self) {
        if let Some(watcher) = target() {
            watcher.add_dep(self);
        }
    }

    /// Notify all subscribers that the observed value changed.
    ///
    /// Works on a snapshot so subscribers may mutate the list mid-notify
    /// (e.g. a callback tearing itself down). When async batching is off the
    /// scheduler never sorts, so we sort by id here to keep evaluation in
    /// creation order.
    pub fn notify(&self) {
        let mut subs: Vec<Watcher> = self.inner.subs.read().iter().cloned().collect();
        if !config::is_async() {
            subs.sort_by_key(|sub| sub.id());
        }
        for sub in subs {
            sub.update();
        }
    }

    /// Number of current subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subs.read().len()
    }
}

impl Default for Dep {
    fn default() -> Dep {
        Dep::new()
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.id())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

thread_local! {
    /// The evaluation-context stack. `None` entries suspend tracking.
    static TARGET_STACK: RefCell<Vec<Option<Watcher>>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops the evaluation-context stack when dropped.
pub(crate) struct TargetGuard {
    // Not Send: the pop must happen on the thread that pushed.
    _not_send: PhantomData<*const ()>,
}

impl Drop for TargetGuard {
    fn drop(&mut self) {
        TARGET_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Make `watcher` the currently evaluating computation until the returned
/// guard drops. Pushing `None` suspends dependency collection.
pub(crate) fn push_target(watcher: Option<Watcher>) -> TargetGuard {
    TARGET_STACK.with(|stack| {
        stack.borrow_mut().push(watcher);
    });
    TargetGuard {
        _not_send: PhantomData,
    }
}

/// The watcher currently being evaluated on this thread, if any.
pub fn target() -> Option<Watcher> {
    TARGET_STACK.with(|stack| stack.borrow().last().cloned().flatten())
}

/// Whether a watcher is currently collecting dependencies on this thread.
pub fn is_tracking() -> bool {
    target().is_some()
}

/// Run `f` with dependency collection suspended.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _guard = push_target(None);
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dep_ids_are_unique() {
        let a = Dep::new();
        let b = Dep::new();
        let c = Dep::new();
        assert!(a.id() < b.id());
        assert!(b.id() < c.id());
    }

    #[test]
    fn empty_stack_registers_nothing() {
        assert!(!is_tracking());
        assert!(target().is_none());

        // depend() with no target is a no-op
        let dep = Dep::new();
        dep.depend();
        assert_eq!(dep.subscriber_count(), 0);
    }

    #[test]
    fn untracked_suspends_collection() {
        assert!(!is_tracking());
        let ran = untracked(|| {
            assert!(!is_tracking());
            assert!(target().is_none());
            true
        });
        assert!(ran);
    }

    #[test]
    fn guard_restores_stack_on_drop() {
        {
            let _guard = push_target(None);
            TARGET_STACK.with(|stack| assert_eq!(stack.borrow().len(), 1));
        }
        TARGET_STACK.with(|stack| assert!(stack.borrow().is_empty()));
    }
}
