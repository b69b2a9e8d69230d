//! Peer identity and connection state.
//!
//! A channel is paired with exactly one counterpart. Its transport handle and
//! origin are pinned once, either at initiation (initiator) or from the first
//! valid inbound message (responder), and never reassigned afterwards.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::errors::ConfigError;
use crate::domain::value_objects::Timestamp;

/// Which side of the pairing this channel plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Knows its counterpart up front and opens the handshake (host window).
    Initiator,
    /// Waits for the first inbound message and pins its sender (embedded frame).
    Responder,
}

impl Role {
    /// Stable lowercase name, used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initiator => "initiator",
            Self::Responder => "responder",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ConfigError;

    /// Accepts `initiator`/`window` and `responder`/`iframe`, any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "initiator" | "window" => Ok(Self::Initiator),
            "responder" | "iframe" => Ok(Self::Responder),
            _ => Err(ConfigError::InvalidRole(s.to_string())),
        }
    }
}

/// Handshake state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Created, nothing sent or awaited yet.
    Unconnected,
    /// Handshake sent (initiator) or awaited (responder).
    Connecting,
    /// Handshake round trip completed.
    Connected,
    /// Torn down by `close()`.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unconnected => "unconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Pinned identity of the counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counterpart<H> {
    /// Opaque transport handle used to address the counterpart.
    pub handle: H,
    /// Origin the counterpart reports and is addressed with.
    pub origin: String,
}

/// Result of comparing an inbound sender against the pinned counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityCheck {
    /// Sender is the pinned counterpart.
    Match,
    /// Nothing pinned yet.
    Unpinned,
    /// Origin differs from the pinned origin.
    OriginMismatch { expected: String },
    /// Origin matches but the source handle differs.
    SourceMismatch,
}

/// Connection state for one side of the pairing.
#[derive(Debug, Clone)]
pub struct Peer<H> {
    role: Role,
    counterpart: Option<Counterpart<H>>,
    state: ConnectionState,
    connecting_since: Option<Timestamp>,
    handshake_timeout_reported: bool,
}

impl<H: Clone + PartialEq> Peer<H> {
    /// Create an unconnected peer.
    #[must_use]
    pub fn new(role: Role) -> Self {
        Self {
            role,
            counterpart: None,
            state: ConnectionState::Unconnected,
            connecting_since: None,
            handshake_timeout_reported: false,
        }
    }

    /// This side's role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Current handshake state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the handshake completed and the channel is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Whether `close()` was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state == ConnectionState::Closed
    }

    /// The pinned counterpart, if any.
    #[must_use]
    pub fn counterpart(&self) -> Option<&Counterpart<H>> {
        self.counterpart.as_ref()
    }

    /// Pin the counterpart identity.
    ///
    /// Returns `false` and leaves the existing identity untouched if one is
    /// already pinned.
    pub fn pin(&mut self, handle: H, origin: impl Into<String>) -> bool {
        if self.counterpart.is_some() {
            return false;
        }
        self.counterpart = Some(Counterpart {
            handle,
            origin: origin.into(),
        });
        true
    }

    /// Compare an inbound sender with the pinned identity.
    #[must_use]
    pub fn check(&self, handle: &H, origin: &str) -> IdentityCheck {
        match &self.counterpart {
            None => IdentityCheck::Unpinned,
            Some(pinned) if pinned.origin != origin => IdentityCheck::OriginMismatch {
                expected: pinned.origin.clone(),
            },
            Some(pinned) if &pinned.handle != handle => IdentityCheck::SourceMismatch,
            Some(_) => IdentityCheck::Match,
        }
    }

    /// Enter `Connecting` at `now`. No effect once connected or closed.
    pub fn begin_connecting(&mut self, now: Timestamp) {
        if self.state == ConnectionState::Unconnected {
            self.state = ConnectionState::Connecting;
            self.connecting_since = Some(now);
        }
    }

    /// Record a completed handshake.
    ///
    /// Returns `true` on the first transition into `Connected`. A repeated
    /// handshake returns `false`; callers still raise `connect` for it.
    pub fn mark_connected(&mut self) -> bool {
        match self.state {
            ConnectionState::Closed => false,
            ConnectionState::Connected => false,
            _ => {
                self.state = ConnectionState::Connected;
                self.connecting_since = None;
                true
            }
        }
    }

    /// Tear down. The counterpart stays pinned.
    pub fn close(&mut self) {
        self.state = ConnectionState::Closed;
        self.connecting_since = None;
    }

    /// Report, once, that the handshake has been pending longer than `timeout`.
    pub fn handshake_overdue(&mut self, now: Timestamp, timeout: Duration) -> bool {
        if self.state != ConnectionState::Connecting || self.handshake_timeout_reported {
            return false;
        }
        let Some(since) = self.connecting_since else {
            return false;
        };
        if now < since.saturating_add(timeout) {
            return false;
        }
        self.handshake_timeout_reported = true;
        true
    }
}
