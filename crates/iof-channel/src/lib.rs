//! # IOF Channel
//!
//! Duplex event bus between two isolated execution contexts (for example a
//! host document and an embedded frame) over a one-way, origin-scoped
//! message transport with no delivery guarantee.
//!
//! On top of "send this blob to that peer, maybe" the channel provides:
//!
//! - a handshake establishing the pairing
//! - named events with persistent and once listeners
//! - request/reply correlation with deadlines
//! - origin and source validation of every inbound message
//!
//! ## Architecture
//!
//! - **Domain Layer:** envelope, peer state, listener registry, correlation
//! - **Ports Layer:** `MessageTransport`/`TimeSource` (driven),
//!   `EventChannel`/`InboundPort` (driving)
//! - **Service Layer:** `Initiator` and `Responder` over a shared core
//! - **Adapters Layer:** in-memory hub, system clock
//!
//! ## Example
//!
//! ```rust
//! use iof_channel::adapters::MessageHub;
//! use iof_channel::{EventChannel, Initiator, InboundPort, Responder, ChannelConfig};
//! use serde_json::json;
//!
//! let hub = MessageHub::new();
//! let host_ctx = hub.open_context("https://host.example");
//! let frame_ctx = hub.open_context("https://frame.example");
//! let (host_id, frame_id) = (host_ctx.id(), frame_ctx.id());
//!
//! let frame = Responder::listen(
//!     frame_ctx,
//!     ChannelConfig::default(),
//!     Some("https://host.example".to_string()),
//! )
//! .unwrap();
//! frame.on("sum", |payload, reply| {
//!     let p = payload.unwrap_or_default();
//!     let total = p["a"].as_i64().unwrap_or(0) + p["b"].as_i64().unwrap_or(0);
//!     if let Some(reply) = reply {
//!         reply.ok(vec![json!(total)]).unwrap();
//!     }
//! });
//!
//! let host = Initiator::initiate(
//!     host_ctx,
//!     ChannelConfig::default(),
//!     frame_id,
//!     "https://frame.example",
//! )
//! .unwrap();
//! hub.run_until_idle(&[(host_id, &host), (frame_id, &frame)]);
//! assert!(host.is_connected() && frame.is_connected());
//!
//! host.emit_with_reply("sum", Some(json!({ "a": 2, "b": 3 })), |result| {
//!     assert_eq!(result.unwrap(), vec![json!(5)]);
//! })
//! .unwrap();
//! hub.run_until_idle(&[(host_id, &host), (frame_id, &frame)]);
//! assert_eq!(host.pending_replies(), 0);
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;
pub mod telemetry;

/// Test utilities (deterministic clocks).
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::ChannelConfig;
pub use domain::{
    ChannelError, ConfigError, ConnectionState, CorrelationId, Envelope, ErrorKind, ListenerId,
    Replier, ReplyError, ReplyResult, Role, Timestamp, TransportError, CONNECT_EVENT,
    HANDSHAKE_EVENT,
};
pub use ports::{
    Delivery, DropReason, EventChannel, InboundMessage, InboundPort, MessageTransport, TimeSource,
};
pub use service::{ChannelBuilder, Initiator, Responder};
pub use telemetry::{init_logging, LogConfig, TelemetryError};
