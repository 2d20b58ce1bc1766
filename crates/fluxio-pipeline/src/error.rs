//! Error types for pipeline operations.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

/// Boxed form of an arbitrary handler-raised error.
///
/// Handlers report failures as `Box<dyn Error + Send + Sync>` because a
/// handler's own error type is not known to the pipeline; this is how a
/// statically typed pipeline represents an arbitrary user exception.
pub type HandlerCause = Box<dyn StdError + Send + Sync>;

/// Errors raised by structural or lifecycle pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// `add_*` was given an explicit name already present in the pipeline.
    #[error("context name {name:?} is already in use")]
    DuplicateName { name: String },

    /// `remove`/`replace`/`get`/`context` could not find a match.
    #[error("no context matches {selector}")]
    NotFound { selector: String },

    /// An attempt was made to remove or rename the Head or Tail sentinel.
    #[error("sentinel context {name:?} cannot be removed or renamed")]
    SentinelRemoval { name: String },

    /// `handler_added`/`handler_removed` raised an error.
    #[error("lifecycle callback failed for context {context:?}")]
    Lifecycle {
        context: String,
        #[source]
        cause: HandlerCause,
    },

    /// An inbound/outbound callback raised an error; converted to an
    /// `exception_caught` event at the next context.
    #[error("handler callback failed for context {context:?}")]
    Handler {
        context: String,
        #[source]
        cause: HandlerCause,
    },

    /// A task was submitted to an executor that has already shut down.
    #[error("executor backing context {context:?} has shut down")]
    ExecutorShutDown { context: String },
}

impl PipelineError {
    /// `true` for errors that are synchronous to the structural-op caller
    /// (never surfaced as an in-band `exception_caught` event).
    #[inline]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::DuplicateName { .. } | Self::NotFound { .. } | Self::SentinelRemoval { .. }
        )
    }
}

/// A marker error used to box a plain string as a handler cause, for
/// handlers (and demo/test code) that don't need a dedicated error type.
#[derive(Debug)]
pub struct Message(pub String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for Message {}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
