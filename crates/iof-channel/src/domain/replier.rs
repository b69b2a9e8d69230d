//! Reply handle passed to listeners of correlated envelopes.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use serde_json::Value;

use crate::domain::correlation::{CorrelationId, ReplyBody, ReplyKey};
use crate::domain::errors::{ChannelError, ReplyError};

/// Anything able to put a reply on the wire. Implemented by the channel core.
pub trait ReplySink: Send + Sync {
    /// Send `body` under the wire name derived from `key`.
    fn send_reply(&self, key: &ReplyKey, body: ReplyBody) -> Result<(), ChannelError>;
}

/// Single-shot reply handle for one inbound request.
///
/// Every clone handed out for the same request shares one flag, so at most
/// one reply per correlation id leaves this side.
#[derive(Clone)]
pub struct Replier {
    key: ReplyKey,
    sink: Weak<dyn ReplySink>,
    sent: Arc<AtomicBool>,
}

impl Replier {
    pub(crate) fn new(key: ReplyKey, sink: Weak<dyn ReplySink>) -> Self {
        Self {
            key,
            sink,
            sent: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Same request, answered from a once listener.
    pub(crate) fn for_once(&self) -> Self {
        Self {
            key: self.key.clone().answered_once(true),
            sink: self.sink.clone(),
            sent: Arc::clone(&self.sent),
        }
    }

    /// Correlation id of the request being answered.
    #[must_use]
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.key.cid
    }

    /// Event name of the request being answered.
    #[must_use]
    pub fn event(&self) -> &str {
        &self.key.event
    }

    /// Whether a reply already went out.
    #[must_use]
    pub fn is_sent(&self) -> bool {
        self.sent.load(Ordering::Acquire)
    }

    /// Send the reply. `error = None` signals success.
    ///
    /// # Errors
    ///
    /// - `AlreadyReplied` if any clone already replied
    /// - `ChannelGone` if the channel was dropped
    /// - `Channel` if the send failed; the handle may be used again
    pub fn send(&self, error: Option<String>, args: Vec<Value>) -> Result<(), ReplyError> {
        let sink = self.sink.upgrade().ok_or(ReplyError::ChannelGone)?;
        if self
            .sent
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ReplyError::AlreadyReplied);
        }

        let body = ReplyBody { error, args };
        sink.send_reply(&self.key, body).map_err(|e| {
            self.sent.store(false, Ordering::Release);
            ReplyError::Channel(e)
        })
    }

    /// Successful reply.
    pub fn ok(&self, args: Vec<Value>) -> Result<(), ReplyError> {
        self.send(None, args)
    }

    /// Failed reply carrying `message`.
    pub fn fail(&self, message: impl Into<String>) -> Result<(), ReplyError> {
        self.send(Some(message.into()), Vec::new())
    }
}

impl fmt::Debug for Replier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Replier")
            .field("key", &self.key)
            .field("sent", &self.is_sent())
            .finish_non_exhaustive()
    }
}
