//! Weft Core
//!
//! This crate provides a fine-grained reactive dependency engine: observe a
//! dynamic data tree, evaluate computations against it with automatic
//! dependency collection, and re-run exactly the computations whose inputs
//! changed, batched per tick.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `value`: the dynamic [`Value`] model with shared container handles
//! - `reactive`: deps, reactive cells, deep observation, and watchers
//! - `scheduler`: the dedup/ordered flush queue and the tick runner
//! - `scope`: the public assembly point tying data and watchers together
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use weft_core::{Scope, Value, WatchOptions};
//!
//! let data = Value::from_json(&serde_json::json!({ "count": 0 }));
//! let scope = Scope::new(data.as_object().unwrap().clone());
//!
//! scope.watch(
//!     "count",
//!     Arc::new(|_, new, old| {
//!         println!("count: {old:?} -> {new:?}");
//!         Ok(())
//!     }),
//!     WatchOptions::default(),
//! );
//!
//! // Queues the watcher; the callback runs on the next tick.
//! scope.data().set("count", Value::Int(5));
//! ```

pub mod config;
pub mod error;
pub mod reactive;
pub mod scheduler;
pub mod scope;
pub mod value;

pub use error::Error;
pub use reactive::{
    define_reactive, define_reactive_accessor, delete_key, is_observing, is_tracking, observe,
    observe_root, parse_path, set_key, toggle_observing, traverse, untracked, Dep, Getter,
    Observer, WatchCallback, WatchSource, Watcher, WatcherOptions,
};
pub use scheduler::{
    next_tick, next_tick_handle, queue_activated_callback, queue_watcher, MAX_UPDATE_COUNT,
};
pub use scope::{Scope, WatchOptions};
pub use value::{ArrayRef, ObjectRef, Value};
