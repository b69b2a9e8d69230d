//! Shared channel core.
//!
//! Owns the registry, the pending reply table and the peer state behind one
//! mutex. Nothing is locked while a listener or reply callback runs, so
//! callbacks may re-enter the channel freely.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::ChannelConfig;
use crate::domain::{
    ChannelError, ConnectionState, CorrelationId, Envelope, EventRegistry, ListenerEntry,
    ListenerId, PendingReplies, Peer, Replier, ReplyBody, ReplyCallback, ReplyError, ReplyKey,
    ReplyResult, ReplySink, ReplyStatus, Role, Timestamp, CONNECT_EVENT,
};
use crate::ports::{
    Delivery, DropReason, ErrorListener, Listener, MessageTransport, OnceListener, TimeSource,
};

struct CoreState<H> {
    peer: Peer<H>,
    registry: EventRegistry<Listener, OnceListener>,
    pending: PendingReplies,
    error_listeners: Vec<ListenerEntry<ErrorListener>>,
}

pub(crate) struct ChannelCore<T: MessageTransport> {
    role: Role,
    transport: T,
    config: ChannelConfig,
    time: Arc<dyn TimeSource>,
    state: Mutex<CoreState<T::Handle>>,
    this: Weak<ChannelCore<T>>,
}

impl<T: MessageTransport + 'static> ChannelCore<T> {
    pub(crate) fn new(
        transport: T,
        config: ChannelConfig,
        time: Arc<dyn TimeSource>,
        role: Role,
    ) -> Arc<Self> {
        let state = CoreState {
            peer: Peer::new(role),
            registry: EventRegistry::new(),
            pending: PendingReplies::new(config.retired_reply_window),
            error_listeners: Vec::new(),
        };
        Arc::new_cyclic(|this| Self {
            role,
            transport,
            config,
            time,
            state: Mutex::new(state),
            this: this.clone(),
        })
    }

    pub(crate) fn role(&self) -> Role {
        self.role
    }

    pub(crate) fn log_prefix(&self) -> &str {
        &self.config.log_prefix
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.time.now()
    }

    /// Run `f` against the peer state under the lock.
    pub(crate) fn with_peer<R>(&self, f: impl FnOnce(&mut Peer<T::Handle>) -> R) -> R {
        f(&mut self.state.lock().peer)
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.state.lock().peer.state()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().peer.is_closed()
    }

    pub(crate) fn counterpart_origin(&self) -> Option<String> {
        self.state
            .lock()
            .peer
            .counterpart()
            .map(|c| c.origin.clone())
    }

    pub(crate) fn pending_replies(&self) -> usize {
        self.state.lock().pending.len()
    }

    // -------------------------------------------------------------------------
    // Listener registration
    // -------------------------------------------------------------------------

    pub(crate) fn on(&self, event: &str, listener: Listener) -> ListenerId {
        self.state.lock().registry.on(event, listener)
    }

    pub(crate) fn once(&self, event: &str, listener: OnceListener) -> ListenerId {
        self.state.lock().registry.once(event, listener)
    }

    pub(crate) fn off(&self, event: &str) {
        let removed = self.state.lock().registry.off(event);
        debug!(
            channel = %self.config.log_prefix,
            role = %self.role,
            event,
            removed,
            "Listeners removed"
        );
    }

    pub(crate) fn off_listener(&self, id: ListenerId) -> bool {
        let mut state = self.state.lock();
        if state.registry.off_listener(id) {
            return true;
        }
        let before = state.error_listeners.len();
        state.error_listeners.retain(|entry| entry.id != id);
        state.error_listeners.len() != before
    }

    /// Clear event listeners and pending replies. Error listeners stay.
    pub(crate) fn remove_listeners(&self) {
        let (listeners, pending) = {
            let mut state = self.state.lock();
            (state.registry.clear(), state.pending.clear())
        };
        debug!(
            channel = %self.config.log_prefix,
            role = %self.role,
            listeners,
            pending,
            "All listeners removed"
        );
    }

    pub(crate) fn on_error(&self, listener: ErrorListener) -> ListenerId {
        let mut state = self.state.lock();
        let id = state.registry.allocate_id();
        state.error_listeners.push(ListenerEntry {
            id,
            callback: listener,
        });
        id
    }

    // -------------------------------------------------------------------------
    // Outbound
    // -------------------------------------------------------------------------

    /// Put an envelope on the wire to the pinned counterpart.
    ///
    /// Requires a pinned counterpart and an open channel, not a completed
    /// handshake (the handshake and replies travel this way).
    fn post(&self, envelope: &Envelope) -> Result<(), ChannelError> {
        let target = {
            let state = self.state.lock();
            if state.peer.is_closed() {
                return Err(ChannelError::Closed);
            }
            state
                .peer
                .counterpart()
                .cloned()
                .ok_or(ChannelError::NotConnected {
                    state: state.peer.state(),
                })?
        };
        self.transport
            .post_message(&target.handle, &target.origin, envelope)?;
        Ok(())
    }

    fn ensure_connected(&self) -> Result<(), ChannelError> {
        match self.state() {
            ConnectionState::Connected => Ok(()),
            ConnectionState::Closed => Err(ChannelError::Closed),
            state => Err(ChannelError::NotConnected { state }),
        }
    }

    pub(crate) fn send_handshake(&self) -> Result<(), ChannelError> {
        self.post(&Envelope::handshake())?;
        debug!(
            channel = %self.config.log_prefix,
            role = %self.role,
            "Handshake sent"
        );
        Ok(())
    }

    pub(crate) fn emit(&self, event: &str, payload: Option<Value>) -> Result<(), ChannelError> {
        self.ensure_connected()?;
        self.post(&Envelope::new(event).with_payload(payload))?;
        debug!(
            channel = %self.config.log_prefix,
            role = %self.role,
            event,
            "Event emitted"
        );
        Ok(())
    }

    pub(crate) fn emit_with_reply(
        &self,
        event: &str,
        payload: Option<Value>,
        callback: ReplyCallback,
    ) -> Result<CorrelationId, ChannelError> {
        self.ensure_connected()?;

        let cid = CorrelationId::generate();
        let now = self.now();
        self.state.lock().pending.register(
            event,
            cid.clone(),
            callback,
            now,
            self.config.reply_timeout,
        );

        let envelope = Envelope::new(event)
            .with_payload(payload)
            .with_cid(cid.clone());
        if let Err(e) = self.post(&envelope) {
            self.state.lock().pending.cancel(&cid);
            return Err(e);
        }

        debug!(
            channel = %self.config.log_prefix,
            role = %self.role,
            event,
            cid = %cid,
            "Request emitted"
        );
        Ok(cid)
    }

    pub(crate) fn emit_awaitable(
        &self,
        event: &str,
        payload: Option<Value>,
    ) -> Result<oneshot::Receiver<ReplyResult>, ChannelError> {
        let (tx, rx) = oneshot::channel();
        self.emit_with_reply(
            event,
            payload,
            Box::new(move |result| {
                // Receiver may have been dropped by a caller that stopped waiting.
                let _ = tx.send(result);
            }),
        )?;
        Ok(rx)
    }

    // -------------------------------------------------------------------------
    // Inbound
    // -------------------------------------------------------------------------

    /// Dispatch a validated, non-handshake envelope.
    pub(crate) fn dispatch(&self, envelope: Envelope) -> Delivery {
        if let Some(key) = ReplyKey::parse(&envelope.event) {
            if let Some(delivery) = self.settle_reply(&key, envelope.payload.as_ref()) {
                return delivery;
            }
        }
        self.fire(&envelope.event, envelope.payload, envelope.cid)
    }

    /// Hand a reply to its waiting callback. `None` if `key` belongs to no
    /// correlation of ours, in which case the name is an ordinary event.
    fn settle_reply(&self, key: &ReplyKey, payload: Option<&Value>) -> Option<Delivery> {
        let now = self.now();
        let mut state = self.state.lock();

        match state.pending.status(key, now) {
            ReplyStatus::Unknown => None,
            ReplyStatus::Retired => {
                drop(state);
                warn!(
                    channel = %self.config.log_prefix,
                    role = %self.role,
                    event = %key.event,
                    cid = %key.cid,
                    "Reply for answered or expired request dropped"
                );
                Some(Delivery::Dropped(DropReason::DuplicateReply))
            }
            ReplyStatus::Awaiting => {
                let Some(Ok(body)) = payload.map(ReplyBody::deserialize) else {
                    drop(state);
                    debug!(
                        channel = %self.config.log_prefix,
                        role = %self.role,
                        cid = %key.cid,
                        "Malformed reply body dropped"
                    );
                    return Some(Delivery::Dropped(DropReason::Malformed));
                };
                let pending = state.pending.take(key, now)?;
                drop(state);

                debug!(
                    channel = %self.config.log_prefix,
                    role = %self.role,
                    event = %key.event,
                    cid = %key.cid,
                    "Reply received"
                );
                (pending.callback)(body.into_result());
                Some(Delivery::Reply {
                    cid: key.cid.clone(),
                })
            }
        }
    }

    /// Invoke listeners for `event`: once bucket first, then persistent.
    pub(crate) fn fire(
        &self,
        event: &str,
        payload: Option<Value>,
        cid: Option<CorrelationId>,
    ) -> Delivery {
        let fired = self.state.lock().registry.take_for_dispatch(event);
        let Some(fired) = fired else {
            debug!(
                channel = %self.config.log_prefix,
                role = %self.role,
                event,
                "No listener for event"
            );
            return Delivery::Dropped(DropReason::NoListener);
        };

        let listeners = fired.len();
        let replier = cid.map(|cid| Replier::new(ReplyKey::new(event, cid), self.sink()));

        for listener in fired.once {
            listener(payload.clone(), replier.as_ref().map(Replier::for_once));
        }
        for listener in fired.persistent {
            listener(payload.clone(), replier.clone());
        }

        Delivery::Dispatched {
            event: event.to_string(),
            listeners,
        }
    }

    /// Record a completed handshake and raise `connect`.
    pub(crate) fn handshake_completed(&self) -> Delivery {
        if self.with_peer(Peer::mark_connected) {
            info!(
                channel = %self.config.log_prefix,
                role = %self.role,
                origin = ?self.counterpart_origin(),
                "Connection established"
            );
        } else {
            debug!(
                channel = %self.config.log_prefix,
                role = %self.role,
                "Repeated handshake"
            );
        }
        self.fire(CONNECT_EVENT, None, None);
        Delivery::Connected
    }

    /// Deliver `error` to every error listener and hand it back.
    pub(crate) fn raise(&self, error: ChannelError) -> ChannelError {
        let listeners: Vec<ErrorListener> = self
            .state
            .lock()
            .error_listeners
            .iter()
            .map(|entry| entry.callback.clone())
            .collect();

        warn!(
            channel = %self.config.log_prefix,
            role = %self.role,
            kind = %error.kind(),
            error = %error,
            "Channel error"
        );
        for listener in listeners {
            listener(&error);
        }
        error
    }

    // -------------------------------------------------------------------------
    // Maintenance
    // -------------------------------------------------------------------------

    /// Time out overdue replies and report an overdue handshake.
    pub(crate) fn expire_pending(&self) -> usize {
        let now = self.now();
        let (expired, handshake_overdue) = {
            let mut state = self.state.lock();
            let expired = state.pending.expire(now);
            let overdue = match self.config.handshake_timeout {
                Some(timeout) if state.peer.handshake_overdue(now, timeout) => Some(timeout),
                _ => None,
            };
            (expired, overdue)
        };

        let count = expired.len();
        for (cid, pending) in expired {
            let after = pending
                .deadline
                .map_or(Duration::ZERO, |deadline| deadline.duration_since(pending.issued_at));
            debug!(
                channel = %self.config.log_prefix,
                role = %self.role,
                event = %pending.event,
                cid = %cid,
                "Reply timed out"
            );
            (pending.callback)(Err(ReplyError::TimedOut {
                event: pending.event,
                cid,
                after,
            }));
        }

        if let Some(after) = handshake_overdue {
            self.raise(ChannelError::HandshakeTimeout { after });
        }
        count
    }

    /// Tear down. Listeners and pending replies are dropped, identity stays.
    pub(crate) fn close(&self) {
        let (listeners, pending) = {
            let mut state = self.state.lock();
            state.peer.close();
            state.error_listeners.clear();
            (state.registry.clear(), state.pending.clear())
        };
        info!(
            channel = %self.config.log_prefix,
            role = %self.role,
            listeners,
            pending,
            "Channel closed"
        );
    }

    fn sink(&self) -> Weak<dyn ReplySink> {
        let sink: Weak<dyn ReplySink> = self.this.clone();
        sink
    }
}

impl<T: MessageTransport + 'static> ReplySink for ChannelCore<T> {
    fn send_reply(&self, key: &ReplyKey, body: ReplyBody) -> Result<(), ChannelError> {
        let payload = serde_json::to_value(&body).map_err(|e| ChannelError::Codec(e.to_string()))?;
        self.post(&Envelope::new(key.wire_name()).with_payload(Some(payload)))?;
        debug!(
            channel = %self.config.log_prefix,
            role = %self.role,
            event = %key.event,
            cid = %key.cid,
            failed = body.error.is_some(),
            "Reply sent"
        );
        Ok(())
    }
}
