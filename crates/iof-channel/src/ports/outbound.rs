//! # Driven Ports (Outbound SPI)
//!
//! Interfaces the host application provides to the channel.

use std::fmt;
use std::sync::Arc;

use crate::domain::{Envelope, Timestamp, TransportError};

/// One-way, origin-scoped message transport (e.g. `postMessage`).
///
/// The transport offers no delivery guarantee and at most per-sender FIFO
/// ordering. Inbound messages are handed to the channel by the host through
/// `receive`, not through this trait.
///
/// # Example Implementation
///
/// ```rust,ignore
/// struct WindowTransport;
///
/// impl MessageTransport for WindowTransport {
///     type Handle = WindowProxy;
///
///     fn post_message(
///         &self,
///         target: &WindowProxy,
///         target_origin: &str,
///         envelope: &Envelope,
///     ) -> Result<(), TransportError> {
///         target.post_message(&envelope.to_value()?, target_origin)
///     }
/// }
/// ```
pub trait MessageTransport: Send + Sync {
    /// Opaque handle addressing a context. Compared for source validation.
    type Handle: Clone + PartialEq + fmt::Debug + Send + Sync + 'static;

    /// Send `envelope` to `target`, restricted to `target_origin`.
    ///
    /// Success only means the transport accepted the message.
    fn post_message(
        &self,
        target: &Self::Handle,
        target_origin: &str,
        envelope: &Envelope,
    ) -> Result<(), TransportError>;
}

impl<T: MessageTransport + ?Sized> MessageTransport for Arc<T> {
    type Handle = T::Handle;

    fn post_message(
        &self,
        target: &Self::Handle,
        target_origin: &str,
        envelope: &Envelope,
    ) -> Result<(), TransportError> {
        (**self).post_message(target, target_origin, envelope)
    }
}

/// Abstract interface for time.
///
/// Enables deterministic testing of reply and handshake timeouts.
pub trait TimeSource: Send + Sync {
    /// Current time in milliseconds.
    fn now(&self) -> Timestamp;
}
