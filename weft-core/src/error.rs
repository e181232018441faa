//! Error Types
//!
//! Errors produced by user-supplied code running inside the reactive engine.
//!
//! The engine itself does not fail: dependency tracking, notification, and
//! scheduling are infallible. What can fail is the code the engine runs on
//! behalf of its callers: watcher evaluator functions and change callbacks.
//! Those are fallible by contract (they return `Result<_, Error>`), and every
//! failure is routed through [`handle_error`], the single reporting path, so
//! one failing watcher never takes down a flush.

use thiserror::Error;

/// An error reported by user-supplied code running under the engine.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A watcher's evaluator function reported a failure.
    #[error("evaluation failed: {0}")]
    Eval(String),

    /// A watcher's change callback reported a failure.
    #[error("callback failed: {0}")]
    Callback(String),

    /// A watch path expression could not be parsed into a getter.
    #[error("invalid watch path: {0:?}")]
    InvalidPath(String),
}

/// Report a recoverable error with the context it occurred in.
///
/// Evaluation errors from `user` watchers, all callback errors, and errors
/// surfacing in the flush loop end up here instead of propagating further.
pub(crate) fn handle_error(err: &Error, context: &str) {
    tracing::error!(target: "weft", error = %err, context, "reactive error");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_display_their_context() {
        let err = Error::Eval("division by zero".into());
        assert_eq!(err.to_string(), "evaluation failed: division by zero");

        let err = Error::InvalidPath("a-b".into());
        assert_eq!(err.to_string(), "invalid watch path: \"a-b\"");
    }
}
