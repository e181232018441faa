//! Reactive Primitives
//!
//! This module implements the core reactive system: dependency sets, reactive
//! cells, deep observation, and watchers.
//!
//! # Concepts
//!
//! ## Deps
//!
//! A [`Dep`] is one observable point of subscription. Every reactive cell and
//! every observed container owns a dep; notifying a dep pushes each of its
//! subscribed watchers toward re-evaluation.
//!
//! ## Cells and observation
//!
//! Object fields become reactive by being wrapped in a [`ReactiveCell`]
//! during observation ([`observe`]). Reading a cell while a watcher is
//! evaluating registers a dependency; writing a cell notifies its dep. Arrays
//! are not intercepted per element; their instrumented mutators notify the
//! array's own observer dep instead.
//!
//! ## Watchers
//!
//! A [`Watcher`] evaluates a getter with dependency collection and invokes a
//! callback when the result changes. Watchers come in user, computed (lazy),
//! and sync flavors.
//!
//! # Implementation Notes
//!
//! Dependency detection is automatic: a thread-local evaluation stack marks
//! which watcher is currently running, and every tracked read checks it. This
//! approach (sometimes called "transparent reactivity") means getters are
//! plain closures with no explicit dependency declarations.

mod array;
mod cell;
mod dep;
mod observer;
mod path;
mod traverse;
mod watcher;

pub(crate) use cell::ReactiveCell;

pub use cell::{AccessorFn, MutatorFn};
pub use dep::{is_tracking, target, untracked, Dep};
pub use observer::{
    define_reactive, define_reactive_accessor, delete_key, is_observing, observe, observe_root,
    set_key, toggle_observing, Observer,
};
pub use path::parse_path;
pub use traverse::traverse;
pub use watcher::{
    BeforeHook, Getter, WatchCallback, WatchSource, Watcher, WatcherOptions,
};
