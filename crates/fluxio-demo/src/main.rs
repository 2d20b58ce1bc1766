mod handlers;
mod loopback;

use std::sync::Arc;
use std::time::Duration;

use fluxio_buffer::Buffer;
use fluxio_pipeline::{buffer_message, Pipeline, Promise, TokioExecutor};
use handlers::{LoggingHandler, PrintingHandler, UppercaseHandler};
use loopback::LoopbackTransport;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let transport = Arc::new(LoopbackTransport::new());
    let executor = Arc::new(TokioExecutor::current());
    let pipeline = Pipeline::new(transport.clone(), executor);
    transport.attach(pipeline.clone());
    pipeline.mark_registered();

    pipeline.add_last(LoggingHandler, Some("logging".into())).unwrap();
    pipeline.add_last(UppercaseHandler, Some("uppercase".into())).unwrap();
    pipeline.add_last(PrintingHandler, Some("printing".into())).unwrap();

    pipeline.fire_channel_active();

    for line in ["hello pipeline", "lock-free dispatch", "executor affinity"] {
        let buf = Buffer::new(64, 1024);
        buf.write_bytes(line.as_bytes()).unwrap();
        let (promise, rx) = Promise::pair();
        pipeline.write(buffer_message(buf), promise);
        rx.await.unwrap().unwrap();
    }
    pipeline.flush();
    pipeline.read();

    // Give the fire-and-forget dispatch a moment to land before tearing down.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (promise, rx) = Promise::pair();
    pipeline.close(promise);
    rx.await.unwrap().unwrap();
    pipeline.destroy();
}
