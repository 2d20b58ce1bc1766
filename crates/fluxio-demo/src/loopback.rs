//! An in-memory [`TransportUnsafe`] double: writes loop back as reads
//! instead of touching a socket, the same recording-collaborator shape
//! the pipeline's teacher crate uses for its test exporters.

use std::net::SocketAddr;
use std::sync::Mutex;

use fluxio_pipeline::{downcast_buffer, message_cause, Message, Pipeline, Promise, TransportUnsafe};

/// Feeds every outbound write straight back in as an inbound read on the
/// same pipeline, after a one-element queue drains on `read()`/`flush()`.
///
/// `pipeline` is set once via [`LoopbackTransport::attach`] after the
/// owning [`Pipeline`] exists, since the transport and the pipeline each
/// need a handle to the other.
pub struct LoopbackTransport {
    pipeline: Mutex<Option<Pipeline>>,
    pending: Mutex<Vec<Message>>,
}

impl LoopbackTransport {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pipeline: Mutex::new(None),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn attach(&self, pipeline: Pipeline) {
        *self.pipeline.lock().unwrap() = Some(pipeline);
    }

    fn with_pipeline(&self, f: impl FnOnce(&Pipeline)) {
        if let Some(pipeline) = self.pipeline.lock().unwrap().as_ref() {
            f(pipeline);
        }
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportUnsafe for LoopbackTransport {
    fn bind(&self, _local_addr: SocketAddr, promise: Promise) {
        promise.succeed();
    }

    fn connect(&self, _remote: SocketAddr, _local: Option<SocketAddr>, promise: Promise) {
        promise.succeed();
    }

    fn disconnect(&self, promise: Promise) {
        promise.succeed();
    }

    fn close(&self, promise: Promise) {
        self.pending.lock().unwrap().clear();
        promise.succeed();
    }

    fn deregister(&self, promise: Promise) {
        promise.succeed();
    }

    fn begin_read(&self) {
        let queued: Vec<Message> = std::mem::take(&mut *self.pending.lock().unwrap());
        self.with_pipeline(|pipeline| {
            for msg in queued {
                pipeline.fire_channel_read(msg);
            }
            pipeline.fire_channel_read_complete();
        });
    }

    fn write(&self, msg: Message, promise: Promise) {
        match downcast_buffer(msg) {
            Ok(buf) => {
                self.pending.lock().unwrap().push(Box::new(buf));
                promise.succeed();
            }
            Err(_) => promise.fail(fluxio_pipeline::PipelineError::Handler {
                context: "LoopbackTransport".to_string(),
                cause: message_cause("loopback transport only accepts Buffer messages"),
            }),
        }
    }

    fn flush(&self) {
        self.begin_read();
    }
}
