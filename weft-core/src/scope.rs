//! Reactive Scopes
//!
//! A [`Scope`] owns one root data object and the watchers created against
//! it. It is the public assembly point: observe the data, watch paths or
//! getters, define computed fields, and destroy everything at once.
//!
//! Scopes are cheap shared handles. Destroying a scope tears down its
//! watchers; the data object itself stays observed (observation has no
//! undo), it just stops having subscribers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::handle_error;
use crate::reactive::{
    define_reactive_accessor, is_tracking, observe_root, AccessorFn, Getter, WatchCallback,
    WatchSource, Watcher, WatcherOptions,
};
use crate::value::{ObjectRef, Value};

/// Options for [`Scope::watch`].
#[derive(Clone, Copy, Default)]
pub struct WatchOptions {
    /// Fire on changes anywhere inside the watched value, not just on
    /// identity changes.
    pub deep: bool,
    /// Invoke the callback once immediately with the initial value.
    pub immediate: bool,
    /// Run the callback inline on change instead of batching per tick.
    pub sync: bool,
}

struct ScopeInner {
    data: ObjectRef,
    watchers: Mutex<Vec<Watcher>>,
    render_watcher: RwLock<Option<Watcher>>,
    being_destroyed: AtomicBool,
    destroyed: AtomicBool,
}

/// A shared handle to one reactive scope.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    /// Create a scope over `data`, observing it as root data.
    ///
    /// Root observation bumps the container's root count, which blocks
    /// reactive key adds/deletes on it at runtime.
    pub fn new(data: ObjectRef) -> Scope {
        observe_root(&Value::Object(data.clone()));
        Scope {
            inner: Arc::new(ScopeInner {
                data,
                watchers: Mutex::new(Vec::new()),
                render_watcher: RwLock::new(None),
                being_destroyed: AtomicBool::new(false),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    /// The scope's root data object.
    pub fn data(&self) -> &ObjectRef {
        &self.inner.data
    }

    /// Watch a path or getter, invoking `cb` with (scope, new, old) on
    /// change. Returns the watcher; call [`Watcher::teardown`] to stop.
    pub fn watch(
        &self,
        source: impl Into<WatchSource>,
        cb: WatchCallback,
        options: WatchOptions,
    ) -> Watcher {
        let watcher = Watcher::new(
            self,
            source,
            Some(Arc::clone(&cb)),
            WatcherOptions {
                deep: options.deep,
                user: true,
                sync: options.sync,
                ..WatcherOptions::default()
            },
        );
        if options.immediate {
            let initial = watcher.value().unwrap_or(Value::Null);
            if let Err(err) = cb(self, &initial, &Value::Null) {
                handle_error(
                    &err,
                    &format!("immediate callback for watcher \"{}\"", watcher.expression()),
                );
            }
        }
        watcher
    }

    /// Define a computed field `key` on the scope's data.
    ///
    /// Backed by a lazy watcher: reading the field evaluates the getter only
    /// if a dependency changed since the last read, and forwards the
    /// computed deps to whatever watcher is reading. The field is read-only.
    pub fn define_computed(&self, key: &str, getter: Getter) -> Watcher {
        let watcher = Watcher::new(
            self,
            WatchSource::Getter(getter),
            None,
            WatcherOptions {
                lazy: true,
                ..WatcherOptions::default()
            },
        );

        let accessor_watcher = watcher.clone();
        let accessor_key = key.to_string();
        let accessor: AccessorFn = Arc::new(move || {
            if accessor_watcher.is_dirty() {
                if let Err(err) = accessor_watcher.evaluate() {
                    handle_error(&err, &format!("computed field \"{accessor_key}\""));
                }
            }
            if is_tracking() {
                accessor_watcher.depend();
            }
            accessor_watcher.value().unwrap_or(Value::Null)
        });
        define_reactive_accessor(&self.inner.data, key, accessor, None);
        watcher
    }

    /// Install the scope's render watcher: a non-user watcher flushed
    /// before user watchers of the same age, re-running `render` whenever
    /// anything it read changes.
    pub fn set_render_watcher(
        &self,
        render: Getter,
        before: Option<crate::reactive::BeforeHook>,
    ) -> Watcher {
        let watcher = Watcher::new(
            self,
            WatchSource::Getter(render),
            None,
            WatcherOptions {
                before,
                ..WatcherOptions::default()
            },
        );
        *self.inner.render_watcher.write() = Some(watcher.clone());
        watcher
    }

    /// The scope's render watcher, if one is installed.
    pub fn render_watcher(&self) -> Option<Watcher> {
        self.inner.render_watcher.read().clone()
    }

    /// Number of live watchers registered on this scope.
    pub fn watcher_count(&self) -> usize {
        self.inner.watchers.lock().len()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    pub(crate) fn is_being_destroyed(&self) -> bool {
        self.inner.being_destroyed.load(Ordering::SeqCst)
    }

    /// Tear down every watcher and mark the scope destroyed. Idempotent.
    pub fn destroy(&self) {
        if self.inner.being_destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.inner.render_watcher.write() = None;
        let watchers: Vec<Watcher> = std::mem::take(&mut *self.inner.watchers.lock());
        for watcher in watchers {
            watcher.teardown();
        }
        self.inner.destroyed.store(true, Ordering::SeqCst);
    }

    pub(crate) fn register_watcher(&self, watcher: &Watcher) {
        self.inner.watchers.lock().push(watcher.clone());
    }

    pub(crate) fn remove_watcher(&self, watcher: &Watcher) {
        self.inner
            .watchers
            .lock()
            .retain(|w| w.id() != watcher.id());
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("watcher_count", &self.watcher_count())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
