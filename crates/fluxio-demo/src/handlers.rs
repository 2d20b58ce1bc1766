//! Example pipeline stages wired together by the demo binary.

use fluxio_buffer::Buffer;
use fluxio_pipeline::{buffer_message, downcast_buffer, Handler, HandlerContext, HandlerInterest, Message};

/// Logs lifecycle and inbound-read traffic; never overrides outbound
/// callbacks, so writes pass straight through unlogged.
pub struct LoggingHandler;

impl Handler for LoggingHandler {
    fn handler_added(&self, ctx: &HandlerContext) -> Result<(), fluxio_pipeline::HandlerCause> {
        tracing::info!(context = ctx.name(), "added to pipeline");
        Ok(())
    }

    fn channel_active(&self, ctx: &HandlerContext) -> Result<(), fluxio_pipeline::HandlerCause> {
        tracing::info!(context = ctx.name(), "channel active");
        ctx.fire_channel_active();
        Ok(())
    }

    fn channel_read(&self, ctx: &HandlerContext, msg: Message) -> Result<(), fluxio_pipeline::HandlerCause> {
        tracing::info!(context = ctx.name(), "read {} bytes inbound", msg_len(&msg));
        ctx.fire_channel_read(msg);
        Ok(())
    }

    fn interest(&self) -> HandlerInterest {
        HandlerInterest::CHANNEL_ACTIVE | HandlerInterest::CHANNEL_READ
    }
}

fn msg_len(msg: &Message) -> usize {
    msg.downcast_ref::<Buffer>().map_or(0, Buffer::readable_bytes)
}

/// Upper-cases ASCII payload bytes as they pass inbound.
pub struct UppercaseHandler;

impl Handler for UppercaseHandler {
    fn channel_read(&self, ctx: &HandlerContext, msg: Message) -> Result<(), fluxio_pipeline::HandlerCause> {
        let buf = match downcast_buffer(msg) {
            Ok(buf) => buf,
            Err(other) => {
                ctx.fire_channel_read(other);
                return Ok(());
            }
        };
        let upper: Vec<u8> = buf.get_bytes(buf.reader_index(), buf.readable_bytes())?.iter().map(u8::to_ascii_uppercase).collect();
        let out = Buffer::new(upper.len(), upper.len().max(64));
        out.write_bytes(&upper)?;
        ctx.fire_channel_read(buffer_message(out));
        Ok(())
    }

    fn interest(&self) -> HandlerInterest {
        HandlerInterest::CHANNEL_READ
    }
}

/// Terminal inbound consumer: prints the final payload and releases it.
pub struct PrintingHandler;

impl Handler for PrintingHandler {
    fn channel_read(&self, ctx: &HandlerContext, msg: Message) -> Result<(), fluxio_pipeline::HandlerCause> {
        if let Ok(buf) = downcast_buffer(msg) {
            let bytes = buf.get_bytes(buf.reader_index(), buf.readable_bytes())?;
            let text = String::from_utf8_lossy(&bytes);
            println!("[{}] {}", ctx.name(), text);
            buf.release()?;
        }
        Ok(())
    }

    fn interest(&self) -> HandlerInterest {
        HandlerInterest::CHANNEL_READ
    }
}
