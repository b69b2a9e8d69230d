//! # Channel Service
//!
//! Wires the domain to the ports. Two role types share one core:
//!
//! - [`Initiator`] knows its counterpart up front and opens the handshake.
//! - [`Responder`] pins the first valid sender and answers its handshake.
//!
//! Both implement [`EventChannel`](crate::ports::EventChannel) and
//! [`InboundPort`](crate::ports::InboundPort).

/// Implements the role-independent surface of a channel type holding
/// `core: Arc<ChannelCore<T>>`.
macro_rules! channel_surface {
    ($channel:ident) => {
        impl<T: $crate::ports::MessageTransport + 'static> $crate::ports::EventChannel
            for $channel<T>
        {
            fn on<F>(&self, event: &str, listener: F) -> $crate::domain::ListenerId
            where
                F: Fn(Option<::serde_json::Value>, Option<$crate::domain::Replier>)
                    + Send
                    + Sync
                    + 'static,
            {
                self.core.on(event, ::std::sync::Arc::new(listener))
            }

            fn once<F>(&self, event: &str, listener: F) -> $crate::domain::ListenerId
            where
                F: FnOnce(Option<::serde_json::Value>, Option<$crate::domain::Replier>)
                    + Send
                    + 'static,
            {
                self.core.once(event, Box::new(listener))
            }

            fn off(&self, event: &str) -> &Self {
                self.core.off(event);
                self
            }

            fn off_with<D: FnOnce()>(&self, event: &str, done: D) -> &Self {
                self.core.off(event);
                done();
                self
            }

            fn off_listener(&self, id: $crate::domain::ListenerId) -> bool {
                self.core.off_listener(id)
            }

            fn remove_listeners(&self) -> &Self {
                self.core.remove_listeners();
                self
            }

            fn remove_listeners_with<D: FnOnce()>(&self, done: D) -> &Self {
                self.core.remove_listeners();
                done();
                self
            }

            fn emit(
                &self,
                event: &str,
                payload: Option<::serde_json::Value>,
            ) -> Result<&Self, $crate::domain::ChannelError> {
                self.core.emit(event, payload)?;
                Ok(self)
            }

            fn emit_with_reply<F>(
                &self,
                event: &str,
                payload: Option<::serde_json::Value>,
                on_reply: F,
            ) -> Result<$crate::domain::CorrelationId, $crate::domain::ChannelError>
            where
                F: FnOnce($crate::domain::ReplyResult) + Send + 'static,
            {
                self.core.emit_with_reply(event, payload, Box::new(on_reply))
            }

            fn on_error<F>(&self, listener: F) -> $crate::domain::ListenerId
            where
                F: Fn(&$crate::domain::ChannelError) + Send + Sync + 'static,
            {
                self.core.on_error(::std::sync::Arc::new(listener))
            }

            fn state(&self) -> $crate::domain::ConnectionState {
                self.core.state()
            }

            fn role(&self) -> $crate::domain::Role {
                self.core.role()
            }
        }

        impl<T: $crate::ports::MessageTransport + 'static> $channel<T> {
            /// Send a request and get its reply through a oneshot receiver.
            ///
            /// # Errors
            ///
            /// As `emit`; on failure nothing stays pending.
            pub fn emit_awaitable(
                &self,
                event: &str,
                payload: Option<::serde_json::Value>,
            ) -> Result<
                ::tokio::sync::oneshot::Receiver<$crate::domain::ReplyResult>,
                $crate::domain::ChannelError,
            > {
                self.core.emit_awaitable(event, payload)
            }

            /// Time out overdue replies and report an overdue handshake.
            ///
            /// Returns the number of replies timed out. Call periodically.
            pub fn expire_pending(&self) -> usize {
                self.core.expire_pending()
            }

            /// Tear the channel down. Listeners and pending replies are
            /// dropped; the pinned counterpart is kept.
            pub fn close(&self) {
                self.core.close();
            }

            /// Number of requests awaiting a reply.
            pub fn pending_replies(&self) -> usize {
                self.core.pending_replies()
            }

            /// Origin of the pinned counterpart.
            pub fn counterpart_origin(&self) -> Option<String> {
                self.core.counterpart_origin()
            }

            /// Whether the handshake completed and the channel is open.
            pub fn is_connected(&self) -> bool {
                self.core.state() == $crate::domain::ConnectionState::Connected
            }
        }
    };
}

mod builder;
mod core;
mod initiator;
mod responder;

pub use builder::{validate_origin, ChannelBuilder, ANY_ORIGIN};
pub use initiator::Initiator;
pub use responder::Responder;
