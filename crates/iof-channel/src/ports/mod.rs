//! # Ports Layer
//!
//! - `inbound` - the API applications and the host drive the channel through
//! - `outbound` - what the host must provide (transport, clock)

pub mod inbound;
pub mod outbound;

pub use inbound::{
    Delivery, DropReason, ErrorListener, EventChannel, InboundMessage, InboundPort, Listener,
    OnceListener,
};
pub use outbound::{MessageTransport, TimeSource};
