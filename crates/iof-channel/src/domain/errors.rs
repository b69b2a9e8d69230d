//! Domain errors for the IOF channel.
//!
//! Four families, one per concern:
//!
//! - [`ConfigError`] - invalid options, raised synchronously at construction
//! - [`ChannelError`] - operation and inbound-path failures
//! - [`ReplyError`] - outcome of a correlated request that did not succeed
//! - [`TransportError`] - failures reported by a transport adapter

use std::fmt;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::domain::correlation::CorrelationId;
use crate::domain::peer::{ConnectionState, Role};

/// Errors from channel configuration and construction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A counterpart origin was empty or contained whitespace.
    #[error("Invalid origin <{0}>")]
    InvalidOrigin(String),

    /// The initiator needs a concrete origin to validate replies against.
    #[error("Initiator target origin must be concrete, got <*>")]
    WildcardOrigin,

    /// Unknown role name in options.
    #[error("Unknown role <{0}> (expected initiator/window or responder/iframe)")]
    InvalidRole(String),

    /// The builder was configured for one role and asked to act as the other.
    #[error("Channel configured as {configured} cannot {attempted}")]
    RoleMismatch {
        configured: Role,
        attempted: &'static str,
    },

    /// A timeout or window was configured as zero.
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    /// A numeric option could not be parsed.
    #[error("Invalid value <{value}> for {key}")]
    InvalidValue { key: String, value: String },

    /// The configuration file could not be read.
    #[error("Failed to read config file: {0}")]
    Io(String),

    /// The configuration file is not valid TOML for this schema.
    #[error("Failed to parse config: {0}")]
    Parse(String),
}

/// Coarse classification of channel errors, handed to error listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid configuration or construction arguments.
    Configuration,
    /// Operation requires a completed handshake.
    NotConnected,
    /// Inbound message failed origin or source validation.
    IdentityViolation,
    /// The transport adapter rejected a send.
    Transport,
    /// An envelope could not be encoded.
    Codec,
    /// The handshake did not complete in time.
    Timeout,
    /// The channel was torn down.
    Closed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configuration => "configuration",
            Self::NotConnected => "not-connected",
            Self::IdentityViolation => "identity-violation",
            Self::Transport => "transport",
            Self::Codec => "codec",
            Self::Timeout => "timeout",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Errors from channel operations and inbound message handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// `emit` was called before the handshake completed.
    #[error("No connection established with peer (state: {state})")]
    NotConnected { state: ConnectionState },

    /// A message arrived from an origin other than the expected/pinned one.
    #[error("Invalid event origin: expected <{expected}>, got <{actual}>")]
    OriginViolation { expected: String, actual: String },

    /// A message arrived from a different context sharing the pinned origin.
    #[error("Message source does not match pinned peer (origin <{origin}>)")]
    SourceViolation { origin: String },

    /// The transport adapter failed to send.
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    /// An envelope could not be encoded for the wire.
    #[error("Envelope encoding failed: {0}")]
    Codec(String),

    /// The handshake did not complete within the configured timeout.
    #[error("Handshake not completed within {after:?}")]
    HandshakeTimeout { after: Duration },

    /// The channel was closed.
    #[error("Channel closed")]
    Closed,
}

impl ChannelError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::NotConnected { .. } => ErrorKind::NotConnected,
            Self::OriginViolation { .. } | Self::SourceViolation { .. } => {
                ErrorKind::IdentityViolation
            }
            Self::Transport(_) => ErrorKind::Transport,
            Self::Codec(_) => ErrorKind::Codec,
            Self::HandshakeTimeout { .. } => ErrorKind::Timeout,
            Self::Closed => ErrorKind::Closed,
        }
    }
}

/// Reasons a correlated request did not produce a successful reply.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReplyError {
    /// The counterpart answered with a truthy error value.
    #[error("Remote handler failed: {message}")]
    Remote { message: String, args: Vec<Value> },

    /// No reply arrived before the deadline; the pending entry was evicted.
    #[error("No reply to <{event}> ({cid}) within {after:?}")]
    TimedOut {
        event: String,
        cid: CorrelationId,
        after: Duration,
    },

    /// A reply for this correlation was already sent.
    #[error("Reply already sent for this request")]
    AlreadyReplied,

    /// The channel that issued the reply handle has been dropped.
    #[error("Channel no longer exists")]
    ChannelGone,

    /// Sending the reply failed.
    #[error("Failed to send reply: {0}")]
    Channel(#[from] ChannelError),
}

/// Failures reported by a transport adapter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The target context does not exist (closed frame, navigated away).
    #[error("Unknown target context {0}")]
    UnknownTarget(String),

    /// The transport itself was shut down.
    #[error("Transport closed")]
    Closed,

    /// The envelope could not be serialized by the adapter.
    #[error("Serialization failed: {0}")]
    Serialization(String),
}
