use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::error::HandlerCause;
use crate::executor::{ExecutorBoxed, ExecutorShutDown};
use crate::handler::{EventKind, Handler, HandlerInterest};
use crate::message::Message;
use crate::transport::Promise;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ContextState {
    Added = 0,
    Live = 1,
    PendingRemove = 2,
    Removed = 3,
}

impl ContextState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Added,
            1 => Self::Live,
            2 => Self::PendingRemove,
            _ => Self::Removed,
        }
    }
}

/// One node of the intrusive doubly-linked pipeline list.
///
/// Forward links (`next`) are strong (`Arc`) so the chain from Head keeps
/// every context alive; backward links (`prev`) are `Weak` to avoid a
/// reference cycle.
pub(crate) struct ContextNode {
    pub(crate) name: String,
    pub(crate) handler: Box<dyn Handler>,
    pub(crate) skip_flags: HandlerInterest,
    pub(crate) executor: Arc<dyn ExecutorBoxed>,
    state: AtomicU8,
    pub(crate) next: Mutex<Option<Arc<ContextNode>>>,
    pub(crate) prev: Mutex<Option<Weak<ContextNode>>>,
}

impl ContextNode {
    pub(crate) fn new(
        name: String,
        handler: Box<dyn Handler>,
        executor: Arc<dyn ExecutorBoxed>,
        initial_state: ContextState,
    ) -> Arc<Self> {
        let skip_flags = handler.interest().skip_flags(HandlerInterest::ALL);
        Arc::new(Self {
            name,
            handler,
            skip_flags,
            executor,
            state: AtomicU8::new(initial_state as u8),
            next: Mutex::new(None),
            prev: Mutex::new(None),
        })
    }

    pub(crate) fn state(&self) -> ContextState {
        ContextState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: ContextState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn is_linked(&self) -> bool {
        !matches!(self.state(), ContextState::Removed)
    }
}

/// The handle passed to every [`Handler`] callback: identifies which
/// context is firing and lets the callback forward the event onward.
#[derive(Clone)]
pub struct HandlerContext {
    pub(crate) node: Arc<ContextNode>,
}

impl HandlerContext {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.node.name
    }

    #[must_use]
    pub fn executor(&self) -> Arc<dyn ExecutorBoxed> {
        Arc::clone(&self.node.executor)
    }

    pub fn fire_channel_registered(&self) {
        propagate_inbound(&self.node, InboundEvent::ChannelRegistered);
    }

    pub fn fire_channel_unregistered(&self) {
        propagate_inbound(&self.node, InboundEvent::ChannelUnregistered);
    }

    pub fn fire_channel_active(&self) {
        propagate_inbound(&self.node, InboundEvent::ChannelActive);
    }

    pub fn fire_channel_inactive(&self) {
        propagate_inbound(&self.node, InboundEvent::ChannelInactive);
    }

    pub fn fire_channel_read(&self, msg: Message) {
        propagate_inbound(&self.node, InboundEvent::ChannelRead(msg));
    }

    pub fn fire_channel_read_complete(&self) {
        propagate_inbound(&self.node, InboundEvent::ChannelReadComplete);
    }

    pub fn fire_user_event_triggered(&self, evt: Message) {
        propagate_inbound(&self.node, InboundEvent::UserEvent(evt));
    }

    pub fn fire_channel_writability_changed(&self) {
        propagate_inbound(&self.node, InboundEvent::ChannelWritabilityChanged);
    }

    pub fn fire_exception_caught(&self, cause: HandlerCause) {
        propagate_inbound(&self.node, InboundEvent::ExceptionCaught(cause));
    }

    pub fn fire_bind(&self, local_addr: SocketAddr, promise: Promise) {
        propagate_outbound(&self.node, OutboundEvent::Bind(local_addr, promise));
    }

    pub fn fire_connect(&self, remote: SocketAddr, local: Option<SocketAddr>, promise: Promise) {
        propagate_outbound(&self.node, OutboundEvent::Connect(remote, local, promise));
    }

    pub fn fire_disconnect(&self, promise: Promise) {
        propagate_outbound(&self.node, OutboundEvent::Disconnect(promise));
    }

    pub fn fire_close(&self, promise: Promise) {
        propagate_outbound(&self.node, OutboundEvent::Close(promise));
    }

    pub fn fire_deregister(&self, promise: Promise) {
        propagate_outbound(&self.node, OutboundEvent::Deregister(promise));
    }

    pub fn fire_read(&self) {
        propagate_outbound(&self.node, OutboundEvent::Read);
    }

    pub fn fire_write(&self, msg: Message, promise: Promise) {
        propagate_outbound(&self.node, OutboundEvent::Write(msg, promise));
    }

    pub fn fire_flush(&self) {
        propagate_outbound(&self.node, OutboundEvent::Flush);
    }
}

pub(crate) enum InboundEvent {
    ChannelRegistered,
    ChannelUnregistered,
    ChannelActive,
    ChannelInactive,
    ChannelRead(Message),
    ChannelReadComplete,
    UserEvent(Message),
    ChannelWritabilityChanged,
    ExceptionCaught(HandlerCause),
}

impl InboundEvent {
    fn kind(&self) -> EventKind {
        match self {
            Self::ChannelRegistered => EventKind::ChannelRegistered,
            Self::ChannelUnregistered => EventKind::ChannelUnregistered,
            Self::ChannelActive => EventKind::ChannelActive,
            Self::ChannelInactive => EventKind::ChannelInactive,
            Self::ChannelRead(_) => EventKind::ChannelRead,
            Self::ChannelReadComplete => EventKind::ChannelReadComplete,
            Self::UserEvent(_) => EventKind::UserEvent,
            Self::ChannelWritabilityChanged => EventKind::ChannelWritabilityChanged,
            Self::ExceptionCaught(_) => EventKind::ExceptionCaught,
        }
    }
}

pub(crate) enum OutboundEvent {
    Bind(SocketAddr, Promise),
    Connect(SocketAddr, Option<SocketAddr>, Promise),
    Disconnect(Promise),
    Close(Promise),
    Deregister(Promise),
    Read,
    Write(Message, Promise),
    Flush,
}

impl OutboundEvent {
    fn kind(&self) -> EventKind {
        match self {
            Self::Bind(..) => EventKind::Bind,
            Self::Connect(..) => EventKind::Connect,
            Self::Disconnect(_) => EventKind::Disconnect,
            Self::Close(_) => EventKind::Close,
            Self::Deregister(_) => EventKind::Deregister,
            Self::Read => EventKind::Read,
            Self::Write(..) => EventKind::Write,
            Self::Flush => EventKind::Flush,
        }
    }
}

/// Walks from `from` toward Tail, skipping contexts whose `skip_flags`
/// cover this event kind, and dispatches on the first one that doesn't.
pub(crate) fn propagate_inbound(from: &Arc<ContextNode>, event: InboundEvent) {
    let flag = event.kind().interest_flag();
    let mut cur = from.next.lock().unwrap().clone();
    while let Some(ctx) = cur {
        if ctx.skip_flags.contains(flag) {
            cur = ctx.next.lock().unwrap().clone();
            continue;
        }
        dispatch_inbound(ctx, event);
        return;
    }
    // Reaching here means `from` itself had no linked successor, which
    // only happens if `from` was concurrently removed mid-walk.
}

/// Walks from `from` toward Head, skipping contexts whose `skip_flags`
/// cover this event kind, and dispatches on the first one that doesn't.
pub(crate) fn propagate_outbound(from: &Arc<ContextNode>, event: OutboundEvent) {
    let flag = event.kind().interest_flag();
    let mut cur = from.prev.lock().unwrap().as_ref().and_then(Weak::upgrade);
    while let Some(ctx) = cur {
        if ctx.skip_flags.contains(flag) {
            cur = ctx.prev.lock().unwrap().as_ref().and_then(Weak::upgrade);
            continue;
        }
        dispatch_outbound(ctx, event);
        return;
    }
}

/// Event propagation is fire-and-forget on the target executor: the
/// firing context never blocks waiting for a downstream handler.
pub(crate) fn dispatch_inbound(ctx: Arc<ContextNode>, event: InboundEvent) {
    if ctx.executor.in_event_loop() {
        run_inbound(&ctx, event);
    } else {
        let ctx2 = Arc::clone(&ctx);
        ctx.executor.execute(Box::new(move || run_inbound(&ctx2, event)));
    }
}

pub(crate) fn dispatch_outbound(ctx: Arc<ContextNode>, event: OutboundEvent) {
    if ctx.executor.in_event_loop() {
        run_outbound(&ctx, event);
    } else {
        let ctx2 = Arc::clone(&ctx);
        ctx.executor.execute(Box::new(move || run_outbound(&ctx2, event)));
    }
}

fn run_inbound(ctx: &Arc<ContextNode>, event: InboundEvent) {
    let hctx = HandlerContext { node: Arc::clone(ctx) };
    let result = match event {
        InboundEvent::ChannelRegistered => ctx.handler.channel_registered(&hctx),
        InboundEvent::ChannelUnregistered => ctx.handler.channel_unregistered(&hctx),
        InboundEvent::ChannelActive => ctx.handler.channel_active(&hctx),
        InboundEvent::ChannelInactive => ctx.handler.channel_inactive(&hctx),
        InboundEvent::ChannelRead(msg) => ctx.handler.channel_read(&hctx, msg),
        InboundEvent::ChannelReadComplete => ctx.handler.channel_read_complete(&hctx),
        InboundEvent::UserEvent(evt) => ctx.handler.user_event_triggered(&hctx, evt),
        InboundEvent::ChannelWritabilityChanged => ctx.handler.channel_writability_changed(&hctx),
        InboundEvent::ExceptionCaught(cause) => ctx.handler.exception_caught(&hctx, cause),
    };
    if let Err(cause) = result {
        propagate_inbound(ctx, InboundEvent::ExceptionCaught(cause));
    }
}

fn run_outbound(ctx: &Arc<ContextNode>, event: OutboundEvent) {
    let hctx = HandlerContext { node: Arc::clone(ctx) };
    let result = match event {
        OutboundEvent::Bind(addr, promise) => ctx.handler.bind(&hctx, addr, promise),
        OutboundEvent::Connect(remote, local, promise) => ctx.handler.connect(&hctx, remote, local, promise),
        OutboundEvent::Disconnect(promise) => ctx.handler.disconnect(&hctx, promise),
        OutboundEvent::Close(promise) => ctx.handler.close(&hctx, promise),
        OutboundEvent::Deregister(promise) => ctx.handler.deregister(&hctx, promise),
        OutboundEvent::Read => ctx.handler.read(&hctx),
        OutboundEvent::Write(msg, promise) => ctx.handler.write(&hctx, msg, promise),
        OutboundEvent::Flush => ctx.handler.flush(&hctx),
    };
    if let Err(cause) = result {
        propagate_inbound(ctx, InboundEvent::ExceptionCaught(cause));
    }
}

/// Runs `f` on `executor`, blocking the caller until it completes.
///
/// Used for lifecycle callbacks and destruction, which the structural-op
/// caller must observe as having completed before returning — unlike
/// ordinary event dispatch, which is fire-and-forget. Submits through
/// `submit_boxed` rather than `execute` so a shut-down executor is reported
/// as `Err(ExecutorShutDown)` instead of silently dropping the task.
pub(crate) fn run_on_executor_blocking<R, F>(executor: &Arc<dyn ExecutorBoxed>, f: F) -> Result<R, ExecutorShutDown>
where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    if executor.in_event_loop() {
        return Ok(f());
    }
    let (tx, rx) = std::sync::mpsc::sync_channel(1);
    block_on(executor.submit_boxed(Box::new(move || {
        let _ = tx.send(f());
    })))?;
    Ok(rx.recv().expect("executor ran the submitted task without sending a result"))
}

/// Minimal busy-poll block-on for bridging a synchronous structural-op
/// caller to the `Future` `submit_boxed` returns. Not a general-purpose
/// runtime: reserved for this one blocking handoff, where the polled
/// future is already backed by a task running concurrently on the target
/// executor, so it resolves quickly without needing a real waker.
fn block_on<F: std::future::Future + Unpin>(mut fut: F) -> F::Output {
    use std::pin::Pin;
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    fn no_op(_: *const ()) {}
    fn clone_raw(_: *const ()) -> RawWaker {
        RawWaker::new(std::ptr::null(), &VTABLE)
    }
    static VTABLE: RawWakerVTable = RawWakerVTable::new(clone_raw, no_op, no_op, no_op);
    let waker = unsafe { Waker::from_raw(RawWaker::new(std::ptr::null(), &VTABLE)) };
    let mut cx = Context::from_waker(&waker);
    loop {
        match Pin::new(&mut fut).poll(&mut cx) {
            Poll::Ready(output) => return output,
            Poll::Pending => std::thread::yield_now(),
        }
    }
}
