//! Error types for keel-graph

use thiserror::Error;

/// Result type alias using keel-graph Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from the turn state machine.
///
/// `invoke` itself is infallible (every internal failure degrades to a
/// default or an inline assistant message); only `resume` can fail,
/// and only for caller mistakes.
#[derive(Error, Debug)]
pub enum Error {
    /// No checkpoint exists for the given thread
    #[error("unknown thread: {0}")]
    UnknownThread(String),

    /// The thread exists but is not waiting for a clarification answer
    #[error("thread {0} is not suspended")]
    NotSuspended(String),
}
