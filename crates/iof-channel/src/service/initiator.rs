//! Initiator role (host side).

use std::sync::Arc;

use tracing::{debug, info};

use super::core::ChannelCore;
use crate::config::ChannelConfig;
use crate::domain::{ChannelError, Envelope, IdentityCheck, Role};
use crate::ports::{Delivery, DropReason, InboundMessage, InboundPort, MessageTransport, TimeSource};
use crate::service::ChannelBuilder;

/// Side that knows its counterpart up front and opens the handshake.
///
/// Messages from anyone but the configured counterpart are dropped without
/// surfacing an error.
pub struct Initiator<T: MessageTransport + 'static> {
    core: Arc<ChannelCore<T>>,
}

impl<T: MessageTransport + 'static> Clone for Initiator<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

channel_surface!(Initiator);

impl<T: MessageTransport + 'static> Initiator<T> {
    /// Pair with `target` at `target_origin` and send the handshake.
    ///
    /// Uses the system clock; see [`ChannelBuilder`] to inject another.
    ///
    /// # Errors
    ///
    /// Configuration errors, or `Transport` if the handshake could not be sent.
    pub fn initiate(
        transport: T,
        config: ChannelConfig,
        target: T::Handle,
        target_origin: impl Into<String>,
    ) -> Result<Self, ChannelError> {
        ChannelBuilder::new(transport)
            .config(config)
            .initiate(target, target_origin)
    }

    pub(crate) fn start(
        transport: T,
        config: ChannelConfig,
        time: Arc<dyn TimeSource>,
        target: T::Handle,
        target_origin: String,
    ) -> Result<Self, ChannelError> {
        let core = ChannelCore::new(transport, config, time, Role::Initiator);
        let now = core.now();
        core.with_peer(|peer| {
            peer.pin(target, target_origin.clone());
            peer.begin_connecting(now);
        });

        info!(
            channel = %core.log_prefix(),
            role = %Role::Initiator,
            origin = %target_origin,
            "Initiating handshake"
        );
        core.send_handshake()?;
        Ok(Self { core })
    }
}

impl<T: MessageTransport + 'static> InboundPort<T::Handle> for Initiator<T> {
    fn receive(&self, message: InboundMessage<T::Handle>) -> Result<Delivery, ChannelError> {
        if self.core.is_closed() {
            return Ok(Delivery::Dropped(DropReason::Closed));
        }

        let Some(source) = message.source else {
            debug!(
                channel = %self.core.log_prefix(),
                role = %Role::Initiator,
                origin = %message.origin,
                "Message without source dropped"
            );
            return Ok(Delivery::Dropped(DropReason::MissingSource));
        };

        let identity = self
            .core
            .with_peer(|peer| peer.check(&source, &message.origin));
        if identity != IdentityCheck::Match {
            debug!(
                channel = %self.core.log_prefix(),
                role = %Role::Initiator,
                origin = %message.origin,
                "Message from unexpected sender dropped"
            );
            return Ok(Delivery::Dropped(DropReason::UnexpectedPeer));
        }

        let envelope = match Envelope::from_value(message.data) {
            Ok(envelope) => envelope,
            Err(reason) => {
                debug!(
                    channel = %self.core.log_prefix(),
                    role = %Role::Initiator,
                    %reason,
                    "Malformed message dropped"
                );
                return Ok(Delivery::Dropped(DropReason::Malformed));
            }
        };

        if envelope.is_handshake() {
            return Ok(self.core.handshake_completed());
        }
        Ok(self.core.dispatch(envelope))
    }
}
