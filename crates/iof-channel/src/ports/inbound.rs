//! # Driving Ports (Inbound API)
//!
//! The API applications use against a paired channel, plus the entry point
//! the host calls for every message the transport delivers.

use std::sync::Arc;

use serde_json::Value;

use crate::domain::{
    ChannelError, ConnectionState, CorrelationId, ListenerId, Replier, ReplyResult, Role,
};

/// Persistent listener as stored in the registry.
pub type Listener = Arc<dyn Fn(Option<Value>, Option<Replier>) + Send + Sync>;

/// Once listener as stored in the registry.
pub type OnceListener = Box<dyn FnOnce(Option<Value>, Option<Replier>) + Send>;

/// Error listener.
pub type ErrorListener = Arc<dyn Fn(&ChannelError) + Send + Sync>;

/// A message as handed over by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage<H> {
    /// Sending context, if the transport reported one.
    pub source: Option<H>,
    /// Origin the transport attributes to the sender.
    pub origin: String,
    /// Raw message data.
    pub data: Value,
}

impl<H> InboundMessage<H> {
    /// Message from `source` at `origin`.
    pub fn new(source: H, origin: impl Into<String>, data: Value) -> Self {
        Self {
            source: Some(source),
            origin: origin.into(),
            data,
        }
    }

    /// Message without a source handle.
    pub fn sourceless(origin: impl Into<String>, data: Value) -> Self {
        Self {
            source: None,
            origin: origin.into(),
            data,
        }
    }
}

/// Why an inbound message was dropped without dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// The channel was closed.
    Closed,
    /// The transport did not report a source.
    MissingSource,
    /// Sender is not the configured counterpart (initiator side).
    UnexpectedPeer,
    /// Data was not a valid envelope or reply body.
    Malformed,
    /// Nobody listens for the event.
    NoListener,
    /// Reply for a correlation that was already answered or expired.
    DuplicateReply,
}

/// What happened to an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// A handshake completed (or was repeated) and `connect` was raised.
    Connected,
    /// Listeners for `event` were invoked.
    Dispatched { event: String, listeners: usize },
    /// A pending reply callback was invoked.
    Reply { cid: CorrelationId },
    /// Nothing was invoked.
    Dropped(DropReason),
}

/// Host-facing entry point for delivered messages.
pub trait InboundPort<H> {
    /// Validate and dispatch one inbound message.
    ///
    /// # Errors
    ///
    /// Identity violations on the responder side. Malformed and unexpected
    /// messages are reported as [`Delivery::Dropped`], not errors.
    fn receive(&self, message: InboundMessage<H>) -> Result<Delivery, ChannelError>;
}

/// Event API shared by both roles.
///
/// # Example
///
/// ```rust,ignore
/// fn wire_up<C: EventChannel>(channel: &C) {
///     channel.on("sum", |payload, reply| {
///         if let (Some(p), Some(reply)) = (payload, reply) {
///             let total = p["a"].as_i64().unwrap_or(0) + p["b"].as_i64().unwrap_or(0);
///             let _ = reply.ok(vec![total.into()]);
///         }
///     });
/// }
/// ```
pub trait EventChannel {
    /// Register a persistent listener.
    fn on<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(Option<Value>, Option<Replier>) + Send + Sync + 'static;

    /// Register a listener that fires at most once.
    fn once<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: FnOnce(Option<Value>, Option<Replier>) + Send + 'static;

    /// Remove every listener for `event`.
    fn off(&self, event: &str) -> &Self;

    /// Remove every listener for `event`, then call `done`.
    fn off_with<D: FnOnce()>(&self, event: &str, done: D) -> &Self;

    /// Remove exactly one listener. `false` if it was already gone.
    fn off_listener(&self, id: ListenerId) -> bool;

    /// Clear all event listeners and pending reply callbacks.
    fn remove_listeners(&self) -> &Self;

    /// Clear everything, then call `done`.
    fn remove_listeners_with<D: FnOnce()>(&self, done: D) -> &Self;

    /// Send an event to the counterpart.
    ///
    /// # Errors
    ///
    /// `NotConnected` before the handshake, `Closed` after `close()`,
    /// `Transport` if the adapter rejected the message.
    fn emit(&self, event: &str, payload: Option<Value>) -> Result<&Self, ChannelError>;

    /// Send an event and register `on_reply` for the counterpart's answer.
    ///
    /// # Errors
    ///
    /// As [`EventChannel::emit`]; on failure nothing stays pending.
    fn emit_with_reply<F>(
        &self,
        event: &str,
        payload: Option<Value>,
        on_reply: F,
    ) -> Result<CorrelationId, ChannelError>
    where
        F: FnOnce(ReplyResult) + Send + 'static;

    /// Register an error listener.
    fn on_error<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ChannelError) + Send + Sync + 'static;

    /// Current handshake state.
    fn state(&self) -> ConnectionState;

    /// This side's role.
    fn role(&self) -> Role;
}
