use std::any::Any;

use fluxio_buffer::Buffer;

/// An event-path payload.
///
/// Handlers along the pipeline may replace a message with a different type
/// as they decode or transform it (a framing decoder turns raw bytes into a
/// request struct, say), so the pipeline carries it as `dyn Any` the same
/// way a dynamically typed pipeline would carry `Object`. Inbound reads
/// from the transport collaborator start out as a [`Buffer`].
pub type Message = Box<dyn Any + Send>;

/// Wraps a [`Buffer`] as a pipeline [`Message`].
#[must_use]
pub fn buffer_message(buffer: Buffer) -> Message {
    Box::new(buffer)
}

/// Downcasts a [`Message`] back into a [`Buffer`], returning it unchanged
/// on mismatch.
pub fn downcast_buffer(msg: Message) -> Result<Buffer, Message> {
    msg.downcast::<Buffer>().map(|b| *b)
}
