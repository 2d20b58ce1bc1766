use std::net::SocketAddr;

use tokio::sync::oneshot;

use crate::error::PipelineError;
use crate::message::Message;

/// A write-once completion handle for an outbound transport operation.
///
/// Thin wrapper over [`oneshot::Sender`], mirroring how the sibling
/// streaming crate in this workspace signals one-shot completion for
/// shutdown.
pub struct Promise {
    tx: Option<oneshot::Sender<Result<(), PipelineError>>>,
}

impl Promise {
    #[must_use]
    pub fn pair() -> (Self, oneshot::Receiver<Result<(), PipelineError>>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A promise with no one awaiting it; used for fire-and-forget calls.
    #[must_use]
    pub fn detached() -> Self {
        Self::pair().0
    }

    pub fn succeed(mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Ok(()));
        }
    }

    pub fn fail(mut self, err: PipelineError) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Err(err));
        }
    }
}

/// The transport-facing "unsafe" interface the Head sentinel delegates
/// outbound events to.
///
/// Named for the Netty convention: this is the layer socket/transport
/// drivers implement, not something pipeline-internal code or ordinary
/// handlers call directly. No real socket transport ships in this crate —
/// see the demo binary's in-memory double for an implementation.
pub trait TransportUnsafe: Send + Sync {
    fn bind(&self, local_addr: SocketAddr, promise: Promise);
    fn connect(&self, remote: SocketAddr, local: Option<SocketAddr>, promise: Promise);
    fn disconnect(&self, promise: Promise);
    fn close(&self, promise: Promise);
    fn deregister(&self, promise: Promise);
    fn begin_read(&self);
    fn write(&self, msg: Message, promise: Promise);
    fn flush(&self);
}
