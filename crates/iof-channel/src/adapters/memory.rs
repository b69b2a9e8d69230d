//! In-memory transport simulating isolated contexts.
//!
//! Follows browser `postMessage` semantics closely enough to exercise the
//! protocol: per-sender FIFO, messages silently discarded when the target's
//! origin does not match the requested one, and optional loss injection.
//! Nothing is delivered until the host pumps the hub.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::domain::{ChannelError, Envelope, TransportError};
use crate::ports::{Delivery, InboundMessage, InboundPort, MessageTransport};
use crate::service::ANY_ORIGIN;

/// Upper bound on deliveries in one [`MessageHub::run_until_idle`] call.
pub const MAX_DELIVERIES_PER_RUN: usize = 10_000;

/// Handle addressing one simulated context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

#[derive(Debug)]
struct Context {
    origin: String,
    inbox: VecDeque<InboundMessage<ContextId>>,
    open: bool,
}

#[derive(Debug, Default)]
struct HubState {
    contexts: HashMap<ContextId, Context>,
    next_id: u64,
    drop_next: usize,
    dropped: usize,
    filtered: usize,
}

/// A group of contexts that can post messages to one another.
#[derive(Debug, Clone, Default)]
pub struct MessageHub {
    inner: Arc<Mutex<HubState>>,
}

impl MessageHub {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context living at `origin` and return its transport.
    pub fn open_context(&self, origin: impl Into<String>) -> HubEndpoint {
        let origin = origin.into();
        let mut state = self.inner.lock();
        state.next_id += 1;
        let id = ContextId(state.next_id);
        state.contexts.insert(
            id,
            Context {
                origin: origin.clone(),
                inbox: VecDeque::new(),
                open: true,
            },
        );
        HubEndpoint {
            hub: self.clone(),
            id,
            origin,
        }
    }

    /// Simulate a context going away. Posts to or from it fail afterwards.
    pub fn close_context(&self, id: ContextId) {
        if let Some(context) = self.inner.lock().contexts.get_mut(&id) {
            context.open = false;
            context.inbox.clear();
        }
    }

    /// Lose the next `count` posted messages.
    pub fn drop_next(&self, count: usize) {
        self.inner.lock().drop_next = count;
    }

    /// Number of messages lost through [`MessageHub::drop_next`].
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.inner.lock().dropped
    }

    /// Number of messages discarded for a target origin mismatch.
    #[must_use]
    pub fn filtered(&self) -> usize {
        self.inner.lock().filtered
    }

    /// Queue `message` for `target` as-is, bypassing origin filtering.
    ///
    /// Lets tests forge sources and origins.
    pub fn inject(&self, target: ContextId, message: InboundMessage<ContextId>) {
        if let Some(context) = self.inner.lock().contexts.get_mut(&target) {
            context.inbox.push_back(message);
        }
    }

    /// Pop the oldest undelivered message for `id`.
    pub fn next_message(&self, id: ContextId) -> Option<InboundMessage<ContextId>> {
        self.inner.lock().contexts.get_mut(&id)?.inbox.pop_front()
    }

    /// Number of undelivered messages for `id`.
    #[must_use]
    pub fn queued(&self, id: ContextId) -> usize {
        self.inner
            .lock()
            .contexts
            .get(&id)
            .map_or(0, |context| context.inbox.len())
    }

    /// Hand every queued message for `id` to `port`, in order, including
    /// messages queued while delivering.
    pub fn deliver_all<P>(&self, id: ContextId, port: &P) -> Vec<Result<Delivery, ChannelError>>
    where
        P: InboundPort<ContextId> + ?Sized,
    {
        let mut results = Vec::new();
        while let Some(message) = self.next_message(id) {
            results.push(port.receive(message));
        }
        results
    }

    /// Pump every listed context until no message is queued for any of them.
    ///
    /// Receive errors are dropped here; they also reach the channel's error
    /// listeners. Returns the number of messages delivered.
    pub fn run_until_idle(&self, ports: &[(ContextId, &dyn InboundPort<ContextId>)]) -> usize {
        let mut delivered = 0;
        loop {
            let mut progressed = false;
            for (id, port) in ports {
                if let Some(message) = self.next_message(*id) {
                    let _ = port.receive(message);
                    delivered += 1;
                    progressed = true;
                }
            }
            if !progressed {
                return delivered;
            }
            if delivered >= MAX_DELIVERIES_PER_RUN {
                warn!(delivered, "Hub still busy after delivery limit");
                return delivered;
            }
        }
    }
}

/// Transport for one context of a [`MessageHub`].
#[derive(Debug, Clone)]
pub struct HubEndpoint {
    hub: MessageHub,
    id: ContextId,
    origin: String,
}

impl HubEndpoint {
    /// This context's handle, as seen by others.
    #[must_use]
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// This context's origin.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// The hub this endpoint belongs to.
    #[must_use]
    pub fn hub(&self) -> &MessageHub {
        &self.hub
    }
}

impl MessageTransport for HubEndpoint {
    type Handle = ContextId;

    fn post_message(
        &self,
        target: &ContextId,
        target_origin: &str,
        envelope: &Envelope,
    ) -> Result<(), TransportError> {
        let data = envelope
            .to_value()
            .map_err(|e| TransportError::Serialization(e.to_string()))?;

        let mut state = self.hub.inner.lock();
        if !state.contexts.get(&self.id).is_some_and(|c| c.open) {
            return Err(TransportError::Closed);
        }
        let target_ctx = match state.contexts.get(target) {
            Some(context) if context.open => context,
            _ => return Err(TransportError::UnknownTarget(target.to_string())),
        };

        if target_origin != ANY_ORIGIN && target_origin != target_ctx.origin {
            debug!(
                from = %self.id,
                to = %target,
                target_origin,
                "Message discarded: target origin mismatch"
            );
            state.filtered += 1;
            return Ok(());
        }

        if state.drop_next > 0 {
            state.drop_next -= 1;
            state.dropped += 1;
            debug!(from = %self.id, to = %target, event = %envelope.event, "Message lost");
            return Ok(());
        }

        if let Some(context) = state.contexts.get_mut(target) {
            context
                .inbox
                .push_back(InboundMessage::new(self.id, self.origin.clone(), data));
        }
        Ok(())
    }
}
