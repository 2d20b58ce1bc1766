use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::context::{
    dispatch_inbound, dispatch_outbound, run_on_executor_blocking, ContextNode, ContextState, HandlerContext,
    InboundEvent, OutboundEvent,
};
use crate::error::{HandlerCause, Message as ErrorMessage, PipelineError};
use crate::executor::{ExecutorBoxed, ExecutorShutDown};
use crate::handler::{Handler, HandlerInterest};
use crate::invariants::debug_assert_sentinels_linked;
use crate::message::{downcast_buffer, Message};
use crate::transport::{Promise, TransportUnsafe};

const HEAD_NAME: &str = "Head";
const TAIL_NAME: &str = "Tail";

struct HeadHandler {
    transport: Arc<dyn TransportUnsafe>,
}

impl Handler for HeadHandler {
    fn interest(&self) -> HandlerInterest {
        HandlerInterest::ALL
    }

    fn bind(&self, _ctx: &HandlerContext, local_addr: SocketAddr, promise: Promise) -> Result<(), HandlerCause> {
        self.transport.bind(local_addr, promise);
        Ok(())
    }

    fn connect(
        &self,
        _ctx: &HandlerContext,
        remote: SocketAddr,
        local: Option<SocketAddr>,
        promise: Promise,
    ) -> Result<(), HandlerCause> {
        self.transport.connect(remote, local, promise);
        Ok(())
    }

    fn disconnect(&self, _ctx: &HandlerContext, promise: Promise) -> Result<(), HandlerCause> {
        self.transport.disconnect(promise);
        Ok(())
    }

    fn close(&self, _ctx: &HandlerContext, promise: Promise) -> Result<(), HandlerCause> {
        self.transport.close(promise);
        Ok(())
    }

    fn deregister(&self, _ctx: &HandlerContext, promise: Promise) -> Result<(), HandlerCause> {
        self.transport.deregister(promise);
        Ok(())
    }

    fn read(&self, _ctx: &HandlerContext) -> Result<(), HandlerCause> {
        self.transport.begin_read();
        Ok(())
    }

    fn write(&self, _ctx: &HandlerContext, msg: Message, promise: Promise) -> Result<(), HandlerCause> {
        self.transport.write(msg, promise);
        Ok(())
    }

    fn flush(&self, _ctx: &HandlerContext) -> Result<(), HandlerCause> {
        self.transport.flush();
        Ok(())
    }
}

struct TailHandler;

impl Handler for TailHandler {
    fn interest(&self) -> HandlerInterest {
        HandlerInterest::ALL
    }

    fn channel_read(&self, ctx: &HandlerContext, msg: Message) -> Result<(), HandlerCause> {
        tracing::debug!(context = ctx.name(), "unhandled inbound message reached Tail; releasing");
        if let Ok(buf) = downcast_buffer(msg) {
            let _ = buf.release();
        }
        Ok(())
    }

    fn exception_caught(&self, ctx: &HandlerContext, cause: HandlerCause) -> Result<(), HandlerCause> {
        tracing::warn!(context = ctx.name(), error = %cause, "unhandled exception reached Tail");
        Ok(())
    }
}

struct PipelineInner {
    head: Arc<ContextNode>,
    tail: Arc<ContextNode>,
    names: Mutex<HashMap<String, Arc<ContextNode>>>,
    type_counters: Mutex<HashMap<&'static str, usize>>,
    structural_mutex: Mutex<()>,
    default_executor: Arc<dyn ExecutorBoxed>,
    registered: AtomicBool,
}

/// An ordered stage list through which inbound and outbound events travel.
///
/// Cheap to clone: internally an `Arc`. Structural mutation
/// (`add_*`/`remove`/`replace`) is serialized by a pipeline-wide mutex;
/// event propagation never takes that lock.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<PipelineInner>,
}

enum InsertPosition<'a> {
    First,
    Last,
    Before(&'a str),
    After(&'a str),
}

impl Pipeline {
    #[must_use]
    pub fn new(transport: Arc<dyn TransportUnsafe>, default_executor: Arc<dyn ExecutorBoxed>) -> Self {
        let head = ContextNode::new(
            HEAD_NAME.to_string(),
            Box::new(HeadHandler { transport }),
            Arc::clone(&default_executor),
            ContextState::Live,
        );
        let tail = ContextNode::new(
            TAIL_NAME.to_string(),
            Box::new(TailHandler),
            Arc::clone(&default_executor),
            ContextState::Live,
        );
        *head.next.lock().unwrap() = Some(Arc::clone(&tail));
        *tail.prev.lock().unwrap() = Some(Arc::downgrade(&head));
        debug_assert_sentinels_linked!(head.next.lock().unwrap().is_some(), tail.prev.lock().unwrap().is_some());

        let mut names = HashMap::new();
        names.insert(HEAD_NAME.to_string(), Arc::clone(&head));
        names.insert(TAIL_NAME.to_string(), Arc::clone(&tail));

        Self {
            inner: Arc::new(PipelineInner {
                head,
                tail,
                names: Mutex::new(names),
                type_counters: Mutex::new(HashMap::new()),
                structural_mutex: Mutex::new(()),
                default_executor,
                registered: AtomicBool::new(false),
            }),
        }
    }

    /// Marks the pipeline as registered to its event loop. Before this is
    /// called, lifecycle callbacks run inline regardless of executor
    /// affinity (there is no event loop thread to conflict with yet).
    pub fn mark_registered(&self) {
        self.inner.registered.store(true, Ordering::Release);
    }

    fn generate_name(&self, handler: &dyn Handler) -> String {
        let base = handler.type_name().rsplit("::").next().unwrap_or("Handler");
        let mut counters = self.inner.type_counters.lock().unwrap();
        let names = self.inner.names.lock().unwrap();
        let start = *counters.get(base).unwrap_or(&0);
        let mut n = start;
        loop {
            let candidate = format!("{base}#{n}");
            if !names.contains_key(&candidate) {
                counters.insert(base, n + 1);
                return candidate;
            }
            n += 1;
        }
    }

    fn resolve_anchor(&self, pos: &InsertPosition, names: &HashMap<String, Arc<ContextNode>>) -> Result<(Arc<ContextNode>, Arc<ContextNode>), PipelineError> {
        match pos {
            InsertPosition::First => {
                let after = self.inner.head.next.lock().unwrap().clone().expect("head.next always set");
                Ok((Arc::clone(&self.inner.head), after))
            }
            InsertPosition::Last => {
                let before = self.inner.tail.prev.lock().unwrap().as_ref().and_then(Weak::upgrade).expect("tail.prev always set");
                Ok((before, Arc::clone(&self.inner.tail)))
            }
            InsertPosition::Before(target) => {
                let anchor = names
                    .get(*target)
                    .cloned()
                    .ok_or_else(|| PipelineError::NotFound { selector: (*target).to_string() })?;
                let before = anchor.prev.lock().unwrap().as_ref().and_then(Weak::upgrade).expect("linked node has a prev");
                Ok((before, anchor))
            }
            InsertPosition::After(target) => {
                let anchor = names
                    .get(*target)
                    .cloned()
                    .ok_or_else(|| PipelineError::NotFound { selector: (*target).to_string() })?;
                let after = anchor.next.lock().unwrap().clone().expect("linked node has a next");
                Ok((anchor, after))
            }
        }
    }

    fn insert(
        &self,
        pos: InsertPosition,
        handler: Box<dyn Handler>,
        name: Option<String>,
        executor: Option<Arc<dyn ExecutorBoxed>>,
    ) -> Result<HandlerContext, PipelineError> {
        let _guard = self.inner.structural_mutex.lock().unwrap();
        let mut names = self.inner.names.lock().unwrap();

        let resolved_name = match name {
            Some(n) => {
                if names.contains_key(&n) {
                    return Err(PipelineError::DuplicateName { name: n });
                }
                n
            }
            None => self.generate_name(handler.as_ref()),
        };

        let (before, after) = self.resolve_anchor(&pos, &names)?;
        let exec = executor.unwrap_or_else(|| Arc::clone(&self.inner.default_executor));
        let node = ContextNode::new(resolved_name.clone(), handler, exec, ContextState::Added);

        // Populate the new node's own links before publishing it into the
        // chain: event propagation walks next/prev without the structural
        // mutex, so before.next/after.prev must never point at a node whose
        // own prev/next are still unset.
        *node.prev.lock().unwrap() = Some(Arc::downgrade(&before));
        *node.next.lock().unwrap() = Some(Arc::clone(&after));
        *before.next.lock().unwrap() = Some(Arc::clone(&node));
        *after.prev.lock().unwrap() = Some(Arc::downgrade(&node));

        names.insert(resolved_name, Arc::clone(&node));
        drop(names);
        drop(_guard);

        self.run_lifecycle_added(&node);
        Ok(HandlerContext { node })
    }

    pub fn add_first(&self, handler: impl Handler + 'static, name: Option<String>) -> Result<HandlerContext, PipelineError> {
        self.insert(InsertPosition::First, Box::new(handler), name, None)
    }

    pub fn add_last(&self, handler: impl Handler + 'static, name: Option<String>) -> Result<HandlerContext, PipelineError> {
        self.insert(InsertPosition::Last, Box::new(handler), name, None)
    }

    pub fn add_last_on(
        &self,
        handler: impl Handler + 'static,
        name: Option<String>,
        executor: Arc<dyn ExecutorBoxed>,
    ) -> Result<HandlerContext, PipelineError> {
        self.insert(InsertPosition::Last, Box::new(handler), name, Some(executor))
    }

    pub fn add_before(&self, target: &str, handler: impl Handler + 'static, name: Option<String>) -> Result<HandlerContext, PipelineError> {
        self.insert(InsertPosition::Before(target), Box::new(handler), name, None)
    }

    pub fn add_after(&self, target: &str, handler: impl Handler + 'static, name: Option<String>) -> Result<HandlerContext, PipelineError> {
        self.insert(InsertPosition::After(target), Box::new(handler), name, None)
    }

    /// Runs `handler_added`, converting a handler error into the
    /// documented exception contract: the context is removed and an
    /// `exception_caught` fires at its former successor.
    fn run_lifecycle_added(&self, node: &Arc<ContextNode>) {
        let hctx = HandlerContext { node: Arc::clone(node) };
        let node2 = Arc::clone(node);
        let result: Result<(), HandlerCause> = if self.inner.registered.load(Ordering::Acquire) {
            match run_on_executor_blocking(&node.executor, move || node2.handler.handler_added(&hctx)) {
                Ok(inner) => inner,
                Err(ExecutorShutDown) => Err(Box::new(PipelineError::ExecutorShutDown { context: node.name.clone() }) as HandlerCause),
            }
        } else {
            node.handler.handler_added(&hctx)
        };

        match result {
            Ok(()) => node.set_state(ContextState::Live),
            Err(cause) => {
                node.set_state(ContextState::Live);
                let removed = self.unlink(node);
                let cause = PipelineError::Lifecycle { context: node.name.clone(), cause };
                if removed {
                    node.set_state(ContextState::Removed);
                    dispatch_inbound(Arc::clone(&self.inner.head), InboundEvent::ExceptionCaught(Box::new(cause)));
                } else {
                    tracing::warn!(context = node.name.as_str(), "failed to remove context after handler_added error");
                }
            }
        }
    }

    /// Unlinks `node` from the list and name index. Returns `false` if it
    /// was already unlinked.
    fn unlink(&self, node: &Arc<ContextNode>) -> bool {
        let _guard = self.inner.structural_mutex.lock().unwrap();
        let prev = node.prev.lock().unwrap().as_ref().and_then(Weak::upgrade);
        let next = node.next.lock().unwrap().clone();
        let (Some(prev), Some(next)) = (prev, next) else {
            return false;
        };
        *prev.next.lock().unwrap() = Some(Arc::clone(&next));
        *next.prev.lock().unwrap() = Some(Arc::downgrade(&prev));
        *node.next.lock().unwrap() = None;
        *node.prev.lock().unwrap() = None;
        self.inner.names.lock().unwrap().remove(&node.name);
        true
    }

    pub fn remove(&self, name: &str) -> Result<(), PipelineError> {
        if name == HEAD_NAME || name == TAIL_NAME {
            return Err(PipelineError::SentinelRemoval { name: name.to_string() });
        }
        let node = {
            let names = self.inner.names.lock().unwrap();
            names.get(name).cloned().ok_or_else(|| PipelineError::NotFound { selector: name.to_string() })?
        };
        node.set_state(ContextState::PendingRemove);
        self.unlink(&node);
        self.run_lifecycle_removed(&node);
        node.set_state(ContextState::Removed);
        Ok(())
    }

    fn run_lifecycle_removed(&self, node: &Arc<ContextNode>) {
        let hctx = HandlerContext { node: Arc::clone(node) };
        let node2 = Arc::clone(node);
        let result: Result<(), HandlerCause> = if self.inner.registered.load(Ordering::Acquire) {
            match run_on_executor_blocking(&node.executor, move || node2.handler.handler_removed(&hctx)) {
                Ok(inner) => inner,
                Err(ExecutorShutDown) => Err(Box::new(PipelineError::ExecutorShutDown { context: node.name.clone() }) as HandlerCause),
            }
        } else {
            node.handler.handler_removed(&hctx)
        };
        if let Err(cause) = result {
            let cause = PipelineError::Lifecycle { context: node.name.clone(), cause };
            tracing::warn!(context = node.name.as_str(), error = %cause, "handler_removed failed");
        }
    }

    /// Atomically replaces `target`'s handler: the new context is spliced
    /// in and lifecycle-added before the old one is unlinked and
    /// lifecycle-removed, so a concurrent event walk always observes
    /// either the complete old chain or the complete new one.
    pub fn replace(
        &self,
        target: &str,
        new_name: Option<String>,
        new_handler: impl Handler + 'static,
    ) -> Result<HandlerContext, PipelineError> {
        if target == HEAD_NAME || target == TAIL_NAME {
            return Err(PipelineError::SentinelRemoval { name: target.to_string() });
        }
        let new_handler: Box<dyn Handler> = Box::new(new_handler);

        let (old, new_node, resolved_name) = {
            let _guard = self.inner.structural_mutex.lock().unwrap();
            let mut names = self.inner.names.lock().unwrap();
            let old = names.get(target).cloned().ok_or_else(|| PipelineError::NotFound { selector: target.to_string() })?;

            let resolved_name = match new_name {
                Some(n) => {
                    if n != target && names.contains_key(&n) {
                        return Err(PipelineError::DuplicateName { name: n });
                    }
                    n
                }
                None => self.generate_name(new_handler.as_ref()),
            };

            let prev = old.prev.lock().unwrap().as_ref().and_then(Weak::upgrade).expect("linked node has a prev");
            let next = old.next.lock().unwrap().clone().expect("linked node has a next");
            let new_node = ContextNode::new(resolved_name.clone(), new_handler, Arc::clone(&old.executor), ContextState::Added);

            // Same publish-last ordering as insert(): new_node's own links
            // are set before it becomes reachable from prev/next.
            *new_node.prev.lock().unwrap() = Some(Arc::downgrade(&prev));
            *new_node.next.lock().unwrap() = Some(Arc::clone(&next));
            *prev.next.lock().unwrap() = Some(Arc::clone(&new_node));
            *next.prev.lock().unwrap() = Some(Arc::downgrade(&new_node));

            names.remove(target);
            names.insert(resolved_name.clone(), Arc::clone(&new_node));
            (old, new_node, resolved_name)
        };

        self.run_lifecycle_added(&new_node);

        old.set_state(ContextState::PendingRemove);
        *old.next.lock().unwrap() = None;
        *old.prev.lock().unwrap() = None;
        self.run_lifecycle_removed(&old);
        old.set_state(ContextState::Removed);

        let _ = resolved_name;
        Ok(HandlerContext { node: new_node })
    }

    #[must_use]
    pub fn context(&self, name: &str) -> Option<HandlerContext> {
        self.inner.names.lock().unwrap().get(name).cloned().map(|node| HandlerContext { node })
    }

    #[must_use]
    pub fn first(&self) -> Option<HandlerContext> {
        let node = self.inner.head.next.lock().unwrap().clone()?;
        if Arc::ptr_eq(&node, &self.inner.tail) {
            None
        } else {
            Some(HandlerContext { node })
        }
    }

    #[must_use]
    pub fn last(&self) -> Option<HandlerContext> {
        let node = self.inner.tail.prev.lock().unwrap().as_ref().and_then(Weak::upgrade)?;
        if Arc::ptr_eq(&node, &self.inner.head) {
            None
        } else {
            Some(HandlerContext { node })
        }
    }

    /// Contexts in pipeline (Head-to-Tail) order, excluding the sentinels.
    fn ordered_nodes(&self) -> Vec<Arc<ContextNode>> {
        let _guard = self.inner.structural_mutex.lock().unwrap();
        let mut nodes = Vec::new();
        let mut cur = self.inner.head.next.lock().unwrap().clone();
        while let Some(node) = cur {
            if Arc::ptr_eq(&node, &self.inner.tail) {
                break;
            }
            cur = node.next.lock().unwrap().clone();
            nodes.push(node);
        }
        nodes
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.ordered_nodes().iter().map(|node| node.name.clone()).collect()
    }

    #[must_use]
    pub fn to_map(&self) -> HashMap<String, HandlerContext> {
        self.ordered_nodes()
            .into_iter()
            .map(|node| (node.name.clone(), HandlerContext { node }))
            .collect()
    }

    /// Drains the pipeline: `handler_removed` fires head-to-tail first so
    /// no context observes an event after its own removal callback, then
    /// the list is unlinked tail-to-head.
    pub fn destroy(&self) {
        let forward = self.ordered_nodes();

        for node in &forward {
            node.set_state(ContextState::PendingRemove);
            self.run_lifecycle_removed(node);
        }

        for node in forward.iter().rev() {
            self.unlink(node);
            node.set_state(ContextState::Removed);
        }
    }

    // ---- inbound event injection (enters at Head) ----------------------

    pub fn fire_channel_registered(&self) {
        dispatch_inbound(Arc::clone(&self.inner.head), InboundEvent::ChannelRegistered);
    }

    pub fn fire_channel_active(&self) {
        dispatch_inbound(Arc::clone(&self.inner.head), InboundEvent::ChannelActive);
    }

    pub fn fire_channel_inactive(&self) {
        dispatch_inbound(Arc::clone(&self.inner.head), InboundEvent::ChannelInactive);
    }

    pub fn fire_channel_read(&self, msg: Message) {
        dispatch_inbound(Arc::clone(&self.inner.head), InboundEvent::ChannelRead(msg));
    }

    pub fn fire_channel_read_complete(&self) {
        dispatch_inbound(Arc::clone(&self.inner.head), InboundEvent::ChannelReadComplete);
    }

    pub fn fire_exception_caught(&self, cause: HandlerCause) {
        dispatch_inbound(Arc::clone(&self.inner.head), InboundEvent::ExceptionCaught(cause));
    }

    // ---- outbound event injection (enters at Tail) ---------------------

    pub fn bind(&self, local_addr: SocketAddr, promise: Promise) {
        dispatch_outbound(Arc::clone(&self.inner.tail), OutboundEvent::Bind(local_addr, promise));
    }

    pub fn write(&self, msg: Message, promise: Promise) {
        dispatch_outbound(Arc::clone(&self.inner.tail), OutboundEvent::Write(msg, promise));
    }

    pub fn flush(&self) {
        dispatch_outbound(Arc::clone(&self.inner.tail), OutboundEvent::Flush);
    }

    pub fn read(&self) {
        dispatch_outbound(Arc::clone(&self.inner.tail), OutboundEvent::Read);
    }

    pub fn close(&self, promise: Promise) {
        dispatch_outbound(Arc::clone(&self.inner.tail), OutboundEvent::Close(promise));
    }
}

/// Used by handlers/demo code that want to box a plain string as a cause
/// without pulling in a dedicated error type.
#[must_use]
pub fn message_cause(s: impl Into<String>) -> HandlerCause {
    Box::new(ErrorMessage(s.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::buffer_message;
    use fluxio_buffer::Buffer;
    use std::sync::Mutex as StdMutex;

    struct NullTransport;
    impl TransportUnsafe for NullTransport {
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
            promise.succeed();
        }
        fn deregister(&self, promise: Promise) {
            promise.succeed();
        }
        fn begin_read(&self) {}
        fn write(&self, _msg: Message, promise: Promise) {
            promise.succeed();
        }
        fn flush(&self) {}
    }

    struct InlineExecutor;
    impl crate::executor::ExecutorBoxed for InlineExecutor {
        fn in_event_loop(&self) -> bool {
            true
        }
        fn submit_boxed(
            &self,
            task: crate::executor::BoxedTask,
        ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), crate::executor::ExecutorShutDown>> + Send>> {
            task();
            Box::pin(async { Ok(()) })
        }
        fn execute(&self, task: crate::executor::BoxedTask) {
            task();
        }
    }

    fn test_pipeline() -> Pipeline {
        Pipeline::new(Arc::new(NullTransport), Arc::new(InlineExecutor))
    }

    struct TraceHandler {
        label: &'static str,
        trace: Arc<StdMutex<Vec<String>>>,
    }

    impl Handler for TraceHandler {
        fn channel_read(&self, ctx: &HandlerContext, msg: Message) -> Result<(), HandlerCause> {
            self.trace.lock().unwrap().push(format!("{}.channel_read", self.label));
            ctx.fire_channel_read(msg);
            Ok(())
        }

        fn handler_removed(&self, _ctx: &HandlerContext) -> Result<(), HandlerCause> {
            self.trace.lock().unwrap().push(format!("{}.handler_removed", self.label));
            Ok(())
        }

        fn handler_added(&self, _ctx: &HandlerContext) -> Result<(), HandlerCause> {
            self.trace.lock().unwrap().push(format!("{}.handler_added", self.label));
            Ok(())
        }

        fn interest(&self) -> HandlerInterest {
            HandlerInterest::CHANNEL_READ
        }
    }

    #[test]
    fn s5_pipeline_ordering() {
        let pipeline = test_pipeline();
        let trace = Arc::new(StdMutex::new(Vec::new()));
        pipeline
            .add_last(
                TraceHandler { label: "A", trace: Arc::clone(&trace) },
                Some("A".into()),
            )
            .unwrap();
        pipeline
            .add_last(
                TraceHandler { label: "B", trace: Arc::clone(&trace) },
                Some("B".into()),
            )
            .unwrap();
        pipeline
            .add_last(
                TraceHandler { label: "C", trace: Arc::clone(&trace) },
                Some("C".into()),
            )
            .unwrap();

        let buf = Buffer::new(8, 8);
        buf.write_bytes(b"x").unwrap();
        pipeline.fire_channel_read(buffer_message(buf));

        let seen = trace.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                "A.handler_added",
                "B.handler_added",
                "C.handler_added",
                "A.channel_read",
                "B.channel_read",
                "C.channel_read",
            ]
        );
    }

    #[test]
    fn s6_replace_preserves_order() {
        let pipeline = test_pipeline();
        let trace = Arc::new(StdMutex::new(Vec::new()));
        pipeline.add_last(TraceHandler { label: "A", trace: Arc::clone(&trace) }, Some("A".into())).unwrap();
        pipeline.add_last(TraceHandler { label: "B", trace: Arc::clone(&trace) }, Some("B".into())).unwrap();
        pipeline.add_last(TraceHandler { label: "C", trace: Arc::clone(&trace) }, Some("C".into())).unwrap();
        trace.lock().unwrap().clear();

        pipeline
            .replace("B", Some("B2".into()), TraceHandler { label: "B2", trace: Arc::clone(&trace) })
            .unwrap();

        let names = pipeline.names();
        assert!(names.contains(&"B2".to_string()));
        assert!(!names.contains(&"B".to_string()));

        let buf = Buffer::new(8, 8);
        buf.write_bytes(b"x").unwrap();
        pipeline.fire_channel_read(buffer_message(buf));

        let seen = trace.lock().unwrap().clone();
        assert_eq!(seen[0], "B2.handler_added");
        assert_eq!(seen[1], "B.handler_removed");
        assert!(seen.contains(&"A.channel_read".to_string()));
        assert!(seen.contains(&"B2.channel_read".to_string()));
        assert!(seen.contains(&"C.channel_read".to_string()));
    }

    #[test]
    fn duplicate_name_rejected() {
        let pipeline = test_pipeline();
        pipeline.add_last(TraceHandler { label: "A", trace: Arc::new(StdMutex::new(Vec::new())) }, Some("A".into())).unwrap();
        let err = pipeline
            .add_last(TraceHandler { label: "A2", trace: Arc::new(StdMutex::new(Vec::new())) }, Some("A".into()))
            .unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateName { .. }));
    }

    #[test]
    fn sentinel_removal_rejected() {
        let pipeline = test_pipeline();
        assert!(matches!(pipeline.remove(HEAD_NAME), Err(PipelineError::SentinelRemoval { .. })));
        assert!(matches!(pipeline.remove(TAIL_NAME), Err(PipelineError::SentinelRemoval { .. })));
    }

    #[test]
    fn default_name_generation_increments_on_collision() {
        struct Noop;
        impl Handler for Noop {}

        let pipeline = test_pipeline();
        let a = pipeline.add_last(Noop, None).unwrap();
        let b = pipeline.add_last(Noop, None).unwrap();
        assert_ne!(a.name(), b.name());
        assert!(a.name().starts_with("Noop#"));
    }

    #[test]
    fn names_reflect_pipeline_order_not_insertion_order() {
        struct Noop;
        impl Handler for Noop {}

        let pipeline = test_pipeline();
        pipeline.add_last(Noop, Some("C".into())).unwrap();
        pipeline.add_first(Noop, Some("B".into())).unwrap();
        pipeline.add_first(Noop, Some("A".into())).unwrap();

        assert_eq!(pipeline.names(), vec!["A".to_string(), "B".to_string(), "C".to_string()]);
    }

    #[test]
    fn to_map_contains_every_context_by_name() {
        struct Noop;
        impl Handler for Noop {}

        let pipeline = test_pipeline();
        pipeline.add_last(Noop, Some("A".into())).unwrap();
        pipeline.add_last(Noop, Some("B".into())).unwrap();

        let map = pipeline.to_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("A").unwrap().name(), "A");
        assert_eq!(map.get("B").unwrap().name(), "B");
    }

    #[test]
    fn unhandled_read_reaches_tail_and_releases() {
        let pipeline = test_pipeline();
        let buf = Buffer::new(8, 8);
        buf.write_bytes(b"abc").unwrap();
        let rc_before = buf.ref_count();
        pipeline.fire_channel_read(buffer_message(buf));
        assert_eq!(rc_before, 1);
    }
}
