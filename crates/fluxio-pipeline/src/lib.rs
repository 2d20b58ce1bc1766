//! Intrusive channel-handler pipeline.
//!
//! An ordered chain of [`Handler`] stages, each bound to an [`Executor`],
//! through which inbound events (reads, lifecycle transitions) travel
//! toward the application and outbound events (writes, binds) travel
//! toward the [`TransportUnsafe`] collaborator. Structural mutation
//! (`add_*`/`remove`/`replace`) is serialized; event propagation is
//! lock-free and, when a stage's executor differs from the caller's,
//! fire-and-forget.

mod context;
mod error;
mod executor;
mod handler;
mod invariants;
mod message;
mod pipeline;
mod transport;

pub use context::HandlerContext;
pub use error::{HandlerCause, PipelineError};
pub use executor::{BoxedTask, Executor, ExecutorBoxed, ExecutorGroup, ExecutorShutDown, TokioExecutor};
pub use handler::{EventKind, Handler, HandlerInterest};
pub use message::{buffer_message, downcast_buffer, Message};
pub use pipeline::{message_cause, Pipeline};
pub use transport::{Promise, TransportUnsafe};
