//! Watchers
//!
//! A [`Watcher`] is one reactive computation: a getter evaluated with
//! dependency collection, a cached result, and an optional callback invoked
//! with (new, old) when the result changes. Watchers power three surfaces:
//!
//! - user watchers (`Scope::watch`), which run a callback on change,
//! - computed fields (`Scope::define_computed`), created lazy so they only
//!   re-evaluate on demand after being flagged dirty,
//! - sync watchers, which re-run inline from `update()` instead of going
//!   through the scheduler queue.
//!
//! # Dependency rotation
//!
//! Each evaluation collects into a fresh set (`new_deps`) while the previous
//! set (`deps`) stays live. Afterwards `cleanup_deps` unsubscribes from deps
//! present only in the old set and swaps the sets. Two id-sets make the
//! membership checks O(1) and also dedup repeated reads of the same dep
//! within one pass. The rotation keeps the bidirectional invariant: a
//! watcher sits in a dep's subscriber list iff that dep sits in the
//! watcher's `deps`.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::{handle_error, Error};
use crate::reactive::dep::{push_target, Dep};
use crate::reactive::path::parse_path;
use crate::reactive::traverse::traverse;
use crate::scheduler::queue_watcher;
use crate::scope::Scope;
use crate::value::Value;

/// Counter for generating unique watcher IDs. Starts at 1 so id 0 never
/// appears in scheduler bookkeeping.
static WATCHER_UID: AtomicU64 = AtomicU64::new(1);

/// A watcher's evaluation function.
pub type Getter = Arc<dyn Fn(&Scope) -> Result<Value, Error> + Send + Sync>;
/// Change callback, invoked with (scope, new value, old value).
pub type WatchCallback = Arc<dyn Fn(&Scope, &Value, &Value) -> Result<(), Error> + Send + Sync>;
/// Hook invoked just before a queued watcher re-runs in a flush.
pub type BeforeHook = Arc<dyn Fn() + Send + Sync>;

/// What a watcher evaluates: a dotted path into the scope's data, or an
/// arbitrary getter.
#[derive(Clone)]
pub enum WatchSource {
    Path(String),
    Getter(Getter),
}

impl From<&str> for WatchSource {
    fn from(path: &str) -> WatchSource {
        WatchSource::Path(path.to_string())
    }
}

impl From<String> for WatchSource {
    fn from(path: String) -> WatchSource {
        WatchSource::Path(path)
    }
}

impl From<Getter> for WatchSource {
    fn from(getter: Getter) -> WatchSource {
        WatchSource::Getter(getter)
    }
}

/// Behavior flags for a new watcher.
#[derive(Clone, Default)]
pub struct WatcherOptions {
    /// Traverse the result after each evaluation, subscribing to the full
    /// subtree.
    pub deep: bool,
    /// User-supplied watcher: evaluation and callback errors are reported
    /// and swallowed instead of propagated.
    pub user: bool,
    /// Do not evaluate eagerly; flag dirty on update and re-evaluate on
    /// demand.
    pub lazy: bool,
    /// Re-run inline on update instead of queueing.
    pub sync: bool,
    /// Hook run just before a scheduled re-run.
    pub before: Option<BeforeHook>,
}

struct DepTracker {
    deps: Vec<Dep>,
    new_deps: Vec<Dep>,
    dep_ids: HashSet<u64>,
    new_dep_ids: HashSet<u64>,
}

struct WatcherInner {
    id: u64,
    scope: Scope,
    getter: Getter,
    cb: Option<WatchCallback>,
    before: Option<BeforeHook>,
    /// Path or "<function>", for diagnostics.
    expression: String,
    deep: bool,
    user: bool,
    lazy: bool,
    sync: bool,
    active: AtomicBool,
    dirty: AtomicBool,
    value: RwLock<Option<Value>>,
    deps: Mutex<DepTracker>,
}

/// A shared handle to one reactive computation.
#[derive(Clone)]
pub struct Watcher {
    inner: Arc<WatcherInner>,
}

impl Watcher {
    /// Create a watcher on `scope`.
    ///
    /// Unless lazy, the getter runs once immediately to collect the initial
    /// dependency set and cache the initial value. An unparsable path warns
    /// and leaves the watcher inert (its getter yields `Null`).
    pub fn new(
        scope: &Scope,
        source: impl Into<WatchSource>,
        cb: Option<WatchCallback>,
        options: WatcherOptions,
    ) -> Watcher {
        let (getter, expression) = match source.into() {
            WatchSource::Path(path) => match parse_path(&path) {
                Some(getter) => (getter, path),
                None => {
                    tracing::warn!(
                        target: "weft",
                        path = %path,
                        "watcher path failed to parse; only dot-delimited paths are supported"
                    );
                    let inert: Getter = Arc::new(|_| Ok(Value::Null));
                    (inert, path)
                }
            },
            WatchSource::Getter(getter) => (getter, "<function>".to_string()),
        };

        let watcher = Watcher {
            inner: Arc::new(WatcherInner {
                id: WATCHER_UID.fetch_add(1, Ordering::Relaxed),
                scope: scope.clone(),
                getter,
                cb,
                before: options.before,
                expression,
                deep: options.deep,
                user: options.user,
                lazy: options.lazy,
                sync: options.sync,
                active: AtomicBool::new(true),
                dirty: AtomicBool::new(options.lazy),
                value: RwLock::new(None),
                deps: Mutex::new(DepTracker {
                    deps: Vec::new(),
                    new_deps: Vec::new(),
                    dep_ids: HashSet::new(),
                    new_dep_ids: HashSet::new(),
                }),
            }),
        };
        scope.register_watcher(&watcher);

        if !options.lazy {
            match watcher.get() {
                Ok(value) => *watcher.inner.value.write() = Some(value),
                Err(err) => handle_error(&err, &format!("getter for watcher \"{}\"", watcher.expression())),
            }
        }
        watcher
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The watched path, or `"<function>"` for getter watchers.
    pub fn expression(&self) -> &str {
        &self.inner.expression
    }

    /// The cached result of the last evaluation.
    pub fn value(&self) -> Option<Value> {
        self.inner.value.read().clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    pub fn is_sync(&self) -> bool {
        self.inner.sync
    }

    pub(crate) fn before(&self) -> Option<BeforeHook> {
        self.inner.before.clone()
    }

    /// Number of deps this watcher is currently subscribed to.
    pub fn dep_count(&self) -> usize {
        self.inner.deps.lock().deps.len()
    }

    /// Evaluate the getter with this watcher as the collection target.
    ///
    /// Deep watchers traverse the result before collection ends, so the
    /// entire reachable subtree registers. User watcher errors are reported
    /// here; the caller still sees the `Err` to skip the change check.
    fn get(&self) -> Result<Value, Error> {
        let result = {
            let _guard = push_target(Some(self.clone()));
            let result = (self.inner.getter)(&self.inner.scope);
            if let Ok(value) = &result {
                if self.inner.deep {
                    traverse(value);
                }
            }
            result
        };
        self.cleanup_deps();
        result
    }

    /// Record a dep read during evaluation. Subscribes at most once per dep
    /// per pass, and only subscribes to the dep's list if this is a dep the
    /// previous pass did not have.
    pub(crate) fn add_dep(&self, dep: &Dep) {
        let newly_subscribed = {
            let mut tracker = self.inner.deps.lock();
            if tracker.new_dep_ids.contains(&dep.id()) {
                return;
            }
            tracker.new_dep_ids.insert(dep.id());
            tracker.new_deps.push(dep.clone());
            !tracker.dep_ids.contains(&dep.id())
        };
        if newly_subscribed {
            dep.add_sub(self);
        }
    }

    /// Rotate the dependency sets: unsubscribe from deps the last pass read
    /// but this pass did not, then promote the new sets to current.
    fn cleanup_deps(&self) {
        let removed: Vec<Dep> = {
            let mut tracker = self.inner.deps.lock();
            let removed = tracker
                .deps
                .iter()
                .filter(|dep| !tracker.new_dep_ids.contains(&dep.id()))
                .cloned()
                .collect();
            let DepTracker {
                deps,
                new_deps,
                dep_ids,
                new_dep_ids,
            } = &mut *tracker;
            std::mem::swap(deps, new_deps);
            std::mem::swap(dep_ids, new_dep_ids);
            new_deps.clear();
            new_dep_ids.clear();
            removed
        };
        for dep in removed {
            dep.remove_sub(self);
        }
    }

    /// React to a change in one of this watcher's deps: lazy watchers flag
    /// dirty, sync watchers re-run inline, everything else queues.
    pub(crate) fn update(&self) {
        if self.inner.lazy {
            self.inner.dirty.store(true, Ordering::SeqCst);
        } else if self.inner.sync {
            if let Err(err) = self.run() {
                handle_error(&err, &format!("sync watcher \"{}\"", self.expression()));
            }
        } else {
            queue_watcher(self);
        }
    }

    /// Re-evaluate and fire the callback if the result changed.
    ///
    /// The callback also fires on an unchanged container result or in deep
    /// mode, since a mutation inside the value leaves its identity intact.
    pub(crate) fn run(&self) -> Result<(), Error> {
        if !self.is_active() {
            return Ok(());
        }
        let value = match self.get() {
            Ok(value) => value,
            Err(err) => {
                if self.inner.user {
                    handle_error(&err, &format!("getter for watcher \"{}\"", self.expression()));
                    return Ok(());
                }
                return Err(err);
            }
        };
        let old = self.inner.value.read().clone();
        if old.as_ref() != Some(&value) || value.is_container() || self.inner.deep {
            *self.inner.value.write() = Some(value.clone());
            if let Some(cb) = &self.inner.cb {
                let old = old.unwrap_or(Value::Null);
                if let Err(err) = cb(&self.inner.scope, &value, &old) {
                    if self.inner.user {
                        handle_error(
                            &err,
                            &format!("callback for watcher \"{}\"", self.expression()),
                        );
                    } else {
                        return Err(err);
                    }
                }
            }
        }
        Ok(())
    }

    /// Force an evaluation of a lazy watcher and clear its dirty flag.
    pub fn evaluate(&self) -> Result<Value, Error> {
        let value = self.get()?;
        *self.inner.value.write() = Some(value.clone());
        self.inner.dirty.store(false, Ordering::SeqCst);
        Ok(value)
    }

    /// Re-register every current dep with the watcher now evaluating.
    /// Used by computed cells to forward their deps to the outer watcher.
    pub fn depend(&self) {
        let deps: Vec<Dep> = self.inner.deps.lock().deps.clone();
        for dep in deps {
            dep.depend();
        }
    }

    /// Deactivate: unsubscribe from every dep and deregister from the scope.
    /// Idempotent; a torn-down watcher never runs again.
    pub fn teardown(&self) {
        if !self.inner.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if !self.inner.scope.is_being_destroyed() {
            self.inner.scope.remove_watcher(self);
        }
        let deps: Vec<Dep> = {
            let mut tracker = self.inner.deps.lock();
            tracker.dep_ids.clear();
            std::mem::take(&mut tracker.deps)
        };
        for dep in deps {
            dep.remove_sub(self);
        }
    }
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.id())
            .field("expression", &self.expression())
            .field("active", &self.is_active())
            .field("dirty", &self.is_dirty())
            .field("dep_count", &self.dep_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;
    use crate::value::ObjectRef;
    use serde_json::json;
    use std::sync::atomic::AtomicI32;

    fn scope_with(data: serde_json::Value) -> Scope {
        let value = Value::from_json(&data);
        Scope::new(value.as_object().unwrap().clone())
    }

    fn sync_options() -> WatcherOptions {
        WatcherOptions {
            sync: true,
            ..WatcherOptions::default()
        }
    }

    #[test]
    fn initial_evaluation_collects_deps() {
        let scope = scope_with(json!({"a": 1, "b": 2}));
        let watcher = Watcher::new(&scope, "a", None, sync_options());

        assert_eq!(watcher.value(), Some(Value::Int(1)));
        // the field's cell dep
        assert_eq!(watcher.dep_count(), 1);
    }

    #[test]
    fn sync_watcher_fires_on_change() {
        let scope = scope_with(json!({"a": 1}));
        let hits = Arc::new(AtomicI32::new(0));
        let seen = Arc::new(RwLock::new((Value::Null, Value::Null)));

        let cb_hits = Arc::clone(&hits);
        let cb_seen = Arc::clone(&seen);
        let cb: WatchCallback = Arc::new(move |_, new, old| {
            cb_hits.fetch_add(1, Ordering::SeqCst);
            *cb_seen.write() = (new.clone(), old.clone());
            Ok(())
        });

        let _watcher = Watcher::new(&scope, "a", Some(cb), sync_options());
        scope.data().set("a", Value::Int(2));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        let (new, old) = seen.read().clone();
        assert_eq!(new, Value::Int(2));
        assert_eq!(old, Value::Int(1));
    }

    #[test]
    fn same_value_write_does_not_fire() {
        let scope = scope_with(json!({"a": 1}));
        let hits = Arc::new(AtomicI32::new(0));
        let cb_hits = Arc::clone(&hits);
        let cb: WatchCallback = Arc::new(move |_, _, _| {
            cb_hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let _watcher = Watcher::new(&scope, "a", Some(cb), sync_options());
        scope.data().set("a", Value::Int(1));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn branch_switch_prunes_stale_deps() {
        let scope = scope_with(json!({"flag": true, "a": 1, "b": 2}));
        let hits = Arc::new(AtomicI32::new(0));
        let cb_hits = Arc::clone(&hits);
        let cb: WatchCallback = Arc::new(move |_, _, _| {
            cb_hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let getter: Getter = Arc::new(|scope: &Scope| {
            let data = scope.data();
            let branch = if data.get("flag").unwrap().as_bool().unwrap() {
                "a"
            } else {
                "b"
            };
            Ok(data.get(branch).unwrap_or(Value::Null))
        });

        let watcher = Watcher::new(&scope, WatchSource::Getter(getter), Some(cb), sync_options());
        // flag + a
        assert_eq!(watcher.dep_count(), 2);

        scope.data().set("flag", Value::Bool(false));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        // flag + b now; a must be unsubscribed
        assert_eq!(watcher.dep_count(), 2);

        scope.data().set("a", Value::Int(99));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        scope.data().set("b", Value::Int(7));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn lazy_watcher_flags_dirty_instead_of_running() {
        let scope = scope_with(json!({"a": 1}));
        let getter: Getter = Arc::new(|scope: &Scope| {
            Ok(scope.data().get("a").unwrap_or(Value::Null))
        });
        let watcher = Watcher::new(
            &scope,
            WatchSource::Getter(getter),
            None,
            WatcherOptions {
                lazy: true,
                ..WatcherOptions::default()
            },
        );

        // lazy: no eager evaluation
        assert!(watcher.is_dirty());
        assert_eq!(watcher.value(), None);

        assert_eq!(watcher.evaluate().unwrap(), Value::Int(1));
        assert!(!watcher.is_dirty());

        scope.data().set("a", Value::Int(2));
        assert!(watcher.is_dirty());
        assert_eq!(watcher.evaluate().unwrap(), Value::Int(2));
    }

    #[test]
    fn deep_watcher_fires_on_nested_change() {
        let scope = scope_with(json!({"outer": {"inner": 1}}));
        let hits = Arc::new(AtomicI32::new(0));
        let cb_hits = Arc::clone(&hits);
        let cb: WatchCallback = Arc::new(move |_, _, _| {
            cb_hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let _watcher = Watcher::new(
            &scope,
            "outer",
            Some(cb),
            WatcherOptions {
                deep: true,
                sync: true,
                ..WatcherOptions::default()
            },
        );

        let outer = scope.data().get_untracked("outer").unwrap();
        outer.as_object().unwrap().set("inner", Value::Int(2));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shallow_watcher_ignores_nested_change() {
        let scope = scope_with(json!({"outer": {"inner": 1}}));
        let hits = Arc::new(AtomicI32::new(0));
        let cb_hits = Arc::clone(&hits);
        let cb: WatchCallback = Arc::new(move |_, _, _| {
            cb_hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let _watcher = Watcher::new(&scope, "outer", Some(cb), sync_options());
        let outer = scope.data().get_untracked("outer").unwrap();
        outer.as_object().unwrap().set("inner", Value::Int(2));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn teardown_stops_notifications() {
        let scope = scope_with(json!({"a": 1}));
        let hits = Arc::new(AtomicI32::new(0));
        let cb_hits = Arc::clone(&hits);
        let cb: WatchCallback = Arc::new(move |_, _, _| {
            cb_hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let watcher = Watcher::new(&scope, "a", Some(cb), sync_options());
        watcher.teardown();
        assert!(!watcher.is_active());
        assert_eq!(watcher.dep_count(), 0);

        scope.data().set("a", Value::Int(2));
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        // idempotent
        watcher.teardown();
    }

    #[test]
    fn bad_path_watcher_is_inert() {
        let scope = scope_with(json!({"a": 1}));
        let watcher = Watcher::new(&scope, "a[0].b", None, sync_options());
        assert_eq!(watcher.value(), Some(Value::Null));
        assert_eq!(watcher.dep_count(), 0);
    }

    #[test]
    fn user_getter_error_is_swallowed() {
        let scope = Scope::new(ObjectRef::new());
        let getter: Getter = Arc::new(|_| Err(Error::Eval("boom".to_string())));
        let watcher = Watcher::new(
            &scope,
            WatchSource::Getter(getter),
            None,
            WatcherOptions {
                user: true,
                sync: true,
                ..WatcherOptions::default()
            },
        );
        assert_eq!(watcher.value(), None);
        assert!(watcher.run().is_ok());
    }
}
