//! # Request/Reply Correlation
//!
//! Turns a completion callback supplied to `emit_with_reply` into a pending
//! entry keyed by a unique correlation id, and an inbound reply back into a
//! single callback invocation.
//!
//! ## Reply Keys
//!
//! Internally a reply is identified by the structured [`ReplyKey`]
//! `(event, cid, once)`. The delimited string form is produced and parsed only
//! at the wire boundary:
//!
//! ```text
//! <event>--<cid>--@callback          reply from a persistent listener
//! <event>--<cid>--@callback--@once   reply from a once listener
//! ```
//!
//! An inbound name that parses as a reply key is treated as a reply only if
//! its cid is pending (or recently retired) and its event matches, so
//! application events containing the delimiters still dispatch normally.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::errors::ReplyError;
use crate::domain::retired::RetiredCorrelations;
use crate::domain::value_objects::Timestamp;

/// Wire marker appended to reply event names.
pub const CALLBACK_MARKER: &str = "--@callback";

/// Wire marker appended when the answering listener was a once listener.
pub const ONCE_MARKER: &str = "--@once";

const SEPARATOR: &str = "--";

/// Outcome delivered to a reply callback.
pub type ReplyResult = Result<Vec<Value>, ReplyError>;

/// Callback awaiting a reply.
pub type ReplyCallback = Box<dyn FnOnce(ReplyResult) + Send>;

/// Identifier linking a request envelope to its reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a fresh id (v4 UUID, simple form).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Wrap an id received from the counterpart.
    #[must_use]
    pub fn from_wire(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as sent on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Structured identity of a reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReplyKey {
    /// Event name of the original request.
    pub event: String,
    /// Correlation id of the original request.
    pub cid: CorrelationId,
    /// Whether the answering listener was registered with `once`.
    pub once: bool,
}

impl ReplyKey {
    /// Key for a reply to `event` with id `cid`.
    #[must_use]
    pub fn new(event: impl Into<String>, cid: CorrelationId) -> Self {
        Self {
            event: event.into(),
            cid,
            once: false,
        }
    }

    /// Mark whether the answering listener was a once listener.
    #[must_use]
    pub fn answered_once(mut self, once: bool) -> Self {
        self.once = once;
        self
    }

    /// Event name used on the wire for this reply.
    #[must_use]
    pub fn wire_name(&self) -> String {
        let once = if self.once { ONCE_MARKER } else { "" };
        format!(
            "{}{SEPARATOR}{}{CALLBACK_MARKER}{once}",
            self.event, self.cid
        )
    }

    /// Decode a wire event name. `None` if it is not shaped like a reply.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let (rest, once) = match name.strip_suffix(ONCE_MARKER) {
            Some(rest) => (rest, true),
            None => (name, false),
        };
        let rest = rest.strip_suffix(CALLBACK_MARKER)?;
        let (event, cid) = rest.rsplit_once(SEPARATOR)?;
        if event.is_empty() || cid.is_empty() {
            return None;
        }
        Some(Self {
            event: event.to_string(),
            cid: CorrelationId::from_wire(cid),
            once,
        })
    }
}

/// Payload of a reply envelope: `{ "error": false | <string>, "args": [..] }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyBody {
    /// `None` on success; serialized as `false`.
    #[serde(
        default,
        serialize_with = "serialize_error_flag",
        deserialize_with = "deserialize_error_flag"
    )]
    pub error: Option<String>,
    /// Reply arguments.
    pub args: Vec<Value>,
}

impl ReplyBody {
    /// Successful reply.
    #[must_use]
    pub fn ok(args: Vec<Value>) -> Self {
        Self { error: None, args }
    }

    /// Convert into the result handed to the waiting callback.
    #[must_use]
    pub fn into_result(self) -> ReplyResult {
        match self.error {
            None => Ok(self.args),
            Some(message) => Err(ReplyError::Remote {
                message,
                args: self.args,
            }),
        }
    }
}

fn serialize_error_flag<S: Serializer>(error: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
    match error {
        None => s.serialize_bool(false),
        Some(message) => s.serialize_str(message),
    }
}

/// Falsy values (`false`, `null`, `""`) mean success; any other value is an error.
fn deserialize_error_flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s),
        Value::Bool(true) => Some("error".to_string()),
        other => Some(other.to_string()),
    })
}

/// A request awaiting its reply.
pub struct PendingReply {
    /// Event name of the request.
    pub event: String,
    /// Completion callback.
    pub callback: ReplyCallback,
    /// When the request was sent.
    pub issued_at: Timestamp,
    /// When the request times out, if a timeout is configured.
    pub deadline: Option<Timestamp>,
}

impl fmt::Debug for PendingReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingReply")
            .field("event", &self.event)
            .field("issued_at", &self.issued_at)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

/// Classification of an inbound reply-shaped event name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    /// A request with this cid and event is waiting.
    Awaiting,
    /// The cid was already answered or expired.
    Retired,
    /// Not a reply to anything this side sent.
    Unknown,
}

/// Table of outstanding correlated requests.
#[derive(Debug)]
pub struct PendingReplies {
    entries: HashMap<CorrelationId, PendingReply>,
    retired: RetiredCorrelations,
}

impl PendingReplies {
    /// Create a table remembering consumed ids for `retired_window`.
    #[must_use]
    pub fn new(retired_window: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            retired: RetiredCorrelations::with_window(retired_window),
        }
    }

    /// Register a pending request.
    pub fn register(
        &mut self,
        event: impl Into<String>,
        cid: CorrelationId,
        callback: ReplyCallback,
        now: Timestamp,
        timeout: Option<Duration>,
    ) {
        let pending = PendingReply {
            event: event.into(),
            callback,
            issued_at: now,
            deadline: timeout.map(|t| now.saturating_add(t)),
        };
        self.entries.insert(cid, pending);
    }

    /// Classify an inbound reply key without consuming anything.
    #[must_use]
    pub fn status(&self, key: &ReplyKey, now: Timestamp) -> ReplyStatus {
        match self.entries.get(&key.cid) {
            Some(pending) if pending.event == key.event => ReplyStatus::Awaiting,
            Some(_) => ReplyStatus::Unknown,
            None if self.retired.contains(&key.cid, now) => ReplyStatus::Retired,
            None => ReplyStatus::Unknown,
        }
    }

    /// Consume the pending entry matching `key` and retire its id.
    pub fn take(&mut self, key: &ReplyKey, now: Timestamp) -> Option<PendingReply> {
        if self.status(key, now) != ReplyStatus::Awaiting {
            return None;
        }
        let pending = self.entries.remove(&key.cid)?;
        self.retired.retire(key.cid.clone(), now);
        Some(pending)
    }

    /// Remove an entry without retiring it (send failed, nothing went out).
    pub fn cancel(&mut self, cid: &CorrelationId) -> Option<PendingReply> {
        self.entries.remove(cid)
    }

    /// Evict and return every entry whose deadline has passed.
    pub fn expire(&mut self, now: Timestamp) -> Vec<(CorrelationId, PendingReply)> {
        let expired: Vec<CorrelationId> = self
            .entries
            .iter()
            .filter(|(_, p)| p.deadline.is_some_and(|deadline| deadline <= now))
            .map(|(cid, _)| cid.clone())
            .collect();

        let mut evicted = Vec::with_capacity(expired.len());
        for cid in expired {
            if let Some(pending) = self.entries.remove(&cid) {
                self.retired.retire(cid.clone(), now);
                evicted.push((cid, pending));
            }
        }
        evicted.sort_by_key(|(_, p)| p.issued_at);
        evicted
    }

    /// Drop every pending entry without invoking callbacks. Returns the count.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// Whether `cid` is awaiting a reply.
    #[must_use]
    pub fn contains(&self, cid: &CorrelationId) -> bool {
        self.entries.contains_key(cid)
    }

    /// Number of outstanding requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no request is outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PendingReplies {
    fn default() -> Self {
        Self::new(RetiredCorrelations::DEFAULT_WINDOW)
    }
}
