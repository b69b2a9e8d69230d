//! Responder role (embedded side).

use std::sync::Arc;

use tracing::{debug, info};

use super::core::ChannelCore;
use crate::config::ChannelConfig;
use crate::domain::{ChannelError, Envelope, IdentityCheck, Role};
use crate::ports::{Delivery, DropReason, InboundMessage, InboundPort, MessageTransport, TimeSource};
use crate::service::ChannelBuilder;

/// Side that waits for its counterpart.
///
/// The first valid envelope pins its sender for the lifetime of the channel.
/// Messages failing the origin or source check afterwards are identity
/// violations: `receive` returns them as errors and every error listener is
/// notified.
pub struct Responder<T: MessageTransport + 'static> {
    core: Arc<ChannelCore<T>>,
    expected_origin: Option<String>,
}

impl<T: MessageTransport + 'static> Clone for Responder<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            expected_origin: self.expected_origin.clone(),
        }
    }
}

channel_surface!(Responder);

impl<T: MessageTransport + 'static> Responder<T> {
    /// Wait for a counterpart, optionally only from `expected_origin`.
    ///
    /// Uses the system clock; see [`ChannelBuilder`] to inject another.
    ///
    /// # Errors
    ///
    /// Configuration errors only.
    pub fn listen(
        transport: T,
        config: ChannelConfig,
        expected_origin: Option<String>,
    ) -> Result<Self, ChannelError> {
        ChannelBuilder::new(transport)
            .config(config)
            .listen(expected_origin)
    }

    pub(crate) fn start(
        transport: T,
        config: ChannelConfig,
        time: Arc<dyn TimeSource>,
        expected_origin: Option<String>,
    ) -> Self {
        let core = ChannelCore::new(transport, config, time, Role::Responder);
        let now = core.now();
        core.with_peer(|peer| peer.begin_connecting(now));

        info!(
            channel = %core.log_prefix(),
            role = %Role::Responder,
            expected_origin = expected_origin.as_deref().unwrap_or("*"),
            "Listening for handshake"
        );
        Self {
            core,
            expected_origin,
        }
    }

    /// Origin restriction given at construction, if any.
    pub fn expected_origin(&self) -> Option<&str> {
        self.expected_origin.as_deref()
    }
}

impl<T: MessageTransport + 'static> InboundPort<T::Handle> for Responder<T> {
    fn receive(&self, message: InboundMessage<T::Handle>) -> Result<Delivery, ChannelError> {
        if self.core.is_closed() {
            return Ok(Delivery::Dropped(DropReason::Closed));
        }

        if let Some(expected) = &self.expected_origin {
            if expected != &message.origin {
                return Err(self.core.raise(ChannelError::OriginViolation {
                    expected: expected.clone(),
                    actual: message.origin,
                }));
            }
        }

        let Some(source) = message.source else {
            debug!(
                channel = %self.core.log_prefix(),
                role = %Role::Responder,
                origin = %message.origin,
                "Message without source dropped"
            );
            return Ok(Delivery::Dropped(DropReason::MissingSource));
        };

        let envelope = match Envelope::from_value(message.data) {
            Ok(envelope) => envelope,
            Err(reason) => {
                debug!(
                    channel = %self.core.log_prefix(),
                    role = %Role::Responder,
                    %reason,
                    "Malformed message dropped"
                );
                return Ok(Delivery::Dropped(DropReason::Malformed));
            }
        };

        let origin = message.origin;
        let identity = self.core.with_peer(|peer| {
            let identity = peer.check(&source, &origin);
            if identity == IdentityCheck::Unpinned {
                peer.pin(source, origin.clone());
            }
            identity
        });

        match identity {
            IdentityCheck::Match => {}
            IdentityCheck::Unpinned => {
                info!(
                    channel = %self.core.log_prefix(),
                    role = %Role::Responder,
                    origin = %origin,
                    "Counterpart pinned"
                );
            }
            IdentityCheck::OriginMismatch { expected } => {
                return Err(self.core.raise(ChannelError::OriginViolation {
                    expected,
                    actual: origin,
                }));
            }
            IdentityCheck::SourceMismatch => {
                return Err(self
                    .core
                    .raise(ChannelError::SourceViolation { origin }));
            }
        }

        if envelope.is_handshake() {
            if let Err(e) = self.core.send_handshake() {
                return Err(self.core.raise(e));
            }
            return Ok(self.core.handshake_completed());
        }
        Ok(self.core.dispatch(envelope))
    }
}
