use std::ops::{BitOr, BitOrAssign};

use crate::context::HandlerContext;
use crate::error::HandlerCause;
use crate::message::Message;
use crate::transport::Promise;

/// Bitmask of pipeline callbacks a handler declares it actually implements.
///
/// A context's `skip_flags` is the complement of its handler's interest
/// within [`HandlerInterest::ALL`]: dispatch walks past contexts whose
/// interest doesn't include the event kind in flight, without invoking
/// them at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandlerInterest(u32);

macro_rules! interest_flags {
    ($($name:ident = $bit:expr),+ $(,)?) => {
        impl HandlerInterest {
            pub const NONE: Self = Self(0);
            $(pub const $name: Self = Self(1 << $bit);)+
        }
    };
}

interest_flags! {
    CHANNEL_REGISTERED = 0,
    CHANNEL_UNREGISTERED = 1,
    CHANNEL_ACTIVE = 2,
    CHANNEL_INACTIVE = 3,
    CHANNEL_READ = 4,
    CHANNEL_READ_COMPLETE = 5,
    USER_EVENT = 6,
    CHANNEL_WRITABILITY_CHANGED = 7,
    EXCEPTION_CAUGHT = 8,
    BIND = 9,
    CONNECT = 10,
    DISCONNECT = 11,
    CLOSE = 12,
    DEREGISTER = 13,
    READ = 14,
    WRITE = 15,
    FLUSH = 16,
}

impl HandlerInterest {
    pub const ALL_INBOUND: Self = Self(
        Self::CHANNEL_REGISTERED.0
            | Self::CHANNEL_UNREGISTERED.0
            | Self::CHANNEL_ACTIVE.0
            | Self::CHANNEL_INACTIVE.0
            | Self::CHANNEL_READ.0
            | Self::CHANNEL_READ_COMPLETE.0
            | Self::USER_EVENT.0
            | Self::CHANNEL_WRITABILITY_CHANGED.0
            | Self::EXCEPTION_CAUGHT.0,
    );

    pub const ALL_OUTBOUND: Self = Self(
        Self::BIND.0
            | Self::CONNECT.0
            | Self::DISCONNECT.0
            | Self::CLOSE.0
            | Self::DEREGISTER.0
            | Self::READ.0
            | Self::WRITE.0
            | Self::FLUSH.0,
    );

    pub const ALL: Self = Self(Self::ALL_INBOUND.0 | Self::ALL_OUTBOUND.0);

    #[must_use]
    pub const fn contains(self, flag: Self) -> bool {
        self.0 & flag.0 == flag.0
    }

    /// The skip-flags mask for a handler with this interest: every bit in
    /// `universe` that this interest does *not* claim.
    #[must_use]
    pub(crate) const fn skip_flags(self, universe: Self) -> Self {
        Self(!self.0 & universe.0)
    }
}

impl BitOr for HandlerInterest {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for HandlerInterest {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Which callback kind a propagating event corresponds to, used to test a
/// context's skip-flags without invoking it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    ChannelRegistered,
    ChannelUnregistered,
    ChannelActive,
    ChannelInactive,
    ChannelRead,
    ChannelReadComplete,
    UserEvent,
    ChannelWritabilityChanged,
    ExceptionCaught,
    Bind,
    Connect,
    Disconnect,
    Close,
    Deregister,
    Read,
    Write,
    Flush,
}

impl EventKind {
    #[must_use]
    pub const fn interest_flag(self) -> HandlerInterest {
        match self {
            Self::ChannelRegistered => HandlerInterest::CHANNEL_REGISTERED,
            Self::ChannelUnregistered => HandlerInterest::CHANNEL_UNREGISTERED,
            Self::ChannelActive => HandlerInterest::CHANNEL_ACTIVE,
            Self::ChannelInactive => HandlerInterest::CHANNEL_INACTIVE,
            Self::ChannelRead => HandlerInterest::CHANNEL_READ,
            Self::ChannelReadComplete => HandlerInterest::CHANNEL_READ_COMPLETE,
            Self::UserEvent => HandlerInterest::USER_EVENT,
            Self::ChannelWritabilityChanged => HandlerInterest::CHANNEL_WRITABILITY_CHANGED,
            Self::ExceptionCaught => HandlerInterest::EXCEPTION_CAUGHT,
            Self::Bind => HandlerInterest::BIND,
            Self::Connect => HandlerInterest::CONNECT,
            Self::Disconnect => HandlerInterest::DISCONNECT,
            Self::Close => HandlerInterest::CLOSE,
            Self::Deregister => HandlerInterest::DEREGISTER,
            Self::Read => HandlerInterest::READ,
            Self::Write => HandlerInterest::WRITE,
            Self::Flush => HandlerInterest::FLUSH,
        }
    }

    #[must_use]
    pub const fn is_inbound(self) -> bool {
        matches!(
            self,
            Self::ChannelRegistered
                | Self::ChannelUnregistered
                | Self::ChannelActive
                | Self::ChannelInactive
                | Self::ChannelRead
                | Self::ChannelReadComplete
                | Self::UserEvent
                | Self::ChannelWritabilityChanged
                | Self::ExceptionCaught
        )
    }
}

/// User-defined pipeline stage.
///
/// Every callback has a pass-through default that simply fires the event
/// onward (mirroring `ChannelInboundHandlerAdapter`/
/// `ChannelOutboundHandlerAdapter`); override only the callbacks a handler
/// actually cares about, and override [`Handler::interest`] to match so the
/// dispatcher can skip this context entirely for the callbacks it left at
/// the default.
pub trait Handler: Send + Sync {
    fn handler_added(&self, _ctx: &HandlerContext) -> Result<(), HandlerCause> {
        Ok(())
    }

    fn handler_removed(&self, _ctx: &HandlerContext) -> Result<(), HandlerCause> {
        Ok(())
    }

    fn channel_registered(&self, ctx: &HandlerContext) -> Result<(), HandlerCause> {
        ctx.fire_channel_registered();
        Ok(())
    }

    fn channel_unregistered(&self, ctx: &HandlerContext) -> Result<(), HandlerCause> {
        ctx.fire_channel_unregistered();
        Ok(())
    }

    fn channel_active(&self, ctx: &HandlerContext) -> Result<(), HandlerCause> {
        ctx.fire_channel_active();
        Ok(())
    }

    fn channel_inactive(&self, ctx: &HandlerContext) -> Result<(), HandlerCause> {
        ctx.fire_channel_inactive();
        Ok(())
    }

    fn channel_read(&self, ctx: &HandlerContext, msg: Message) -> Result<(), HandlerCause> {
        ctx.fire_channel_read(msg);
        Ok(())
    }

    fn channel_read_complete(&self, ctx: &HandlerContext) -> Result<(), HandlerCause> {
        ctx.fire_channel_read_complete();
        Ok(())
    }

    fn user_event_triggered(&self, ctx: &HandlerContext, evt: Message) -> Result<(), HandlerCause> {
        ctx.fire_user_event_triggered(evt);
        Ok(())
    }

    fn channel_writability_changed(&self, ctx: &HandlerContext) -> Result<(), HandlerCause> {
        ctx.fire_channel_writability_changed();
        Ok(())
    }

    fn exception_caught(&self, ctx: &HandlerContext, cause: HandlerCause) -> Result<(), HandlerCause> {
        ctx.fire_exception_caught(cause);
        Ok(())
    }

    fn bind(&self, ctx: &HandlerContext, local_addr: std::net::SocketAddr, promise: Promise) -> Result<(), HandlerCause> {
        ctx.fire_bind(local_addr, promise);
        Ok(())
    }

    fn connect(
        &self,
        ctx: &HandlerContext,
        remote: std::net::SocketAddr,
        local: Option<std::net::SocketAddr>,
        promise: Promise,
    ) -> Result<(), HandlerCause> {
        ctx.fire_connect(remote, local, promise);
        Ok(())
    }

    fn disconnect(&self, ctx: &HandlerContext, promise: Promise) -> Result<(), HandlerCause> {
        ctx.fire_disconnect(promise);
        Ok(())
    }

    fn close(&self, ctx: &HandlerContext, promise: Promise) -> Result<(), HandlerCause> {
        ctx.fire_close(promise);
        Ok(())
    }

    fn deregister(&self, ctx: &HandlerContext, promise: Promise) -> Result<(), HandlerCause> {
        ctx.fire_deregister(promise);
        Ok(())
    }

    fn read(&self, ctx: &HandlerContext) -> Result<(), HandlerCause> {
        ctx.fire_read();
        Ok(())
    }

    fn write(&self, ctx: &HandlerContext, msg: Message, promise: Promise) -> Result<(), HandlerCause> {
        ctx.fire_write(msg, promise);
        Ok(())
    }

    fn flush(&self, ctx: &HandlerContext) -> Result<(), HandlerCause> {
        ctx.fire_flush();
        Ok(())
    }

    /// Callbacks this handler actually overrides. Defaults to
    /// [`HandlerInterest::ALL`]: never skip, always dispatch (correct but
    /// not on the fast path). Override alongside overriding the matching
    /// callback methods to opt into skip-based propagation.
    fn interest(&self) -> HandlerInterest {
        HandlerInterest::ALL
    }

    /// Whether this handler instance may be added to more than one
    /// position or pipeline. Stateful handlers should leave this `false`.
    fn is_sharable(&self) -> bool {
        false
    }

    /// A short name for diagnostics; used as the basis for default context
    /// naming (`SimpleClassName#N`).
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
