//! # Domain Layer
//!
//! Pure channel logic with no transport or clock dependencies:
//!
//! - `envelope` - wire envelope and built-in event names
//! - `peer` - role, pinned identity, handshake state machine
//! - `registry` - event name -> persistent/once listener buckets
//! - `correlation` - correlation ids, reply keys, pending reply table
//! - `retired` - time-bounded set of consumed correlation ids
//! - `replier` - single-shot reply handle given to listeners
//! - `errors` - error taxonomy

pub mod correlation;
pub mod envelope;
pub mod errors;
pub mod peer;
pub mod registry;
pub mod replier;
pub mod retired;
pub mod value_objects;

pub use correlation::{
    CorrelationId, PendingReplies, PendingReply, ReplyBody, ReplyCallback, ReplyKey, ReplyResult,
    ReplyStatus, CALLBACK_MARKER, ONCE_MARKER,
};
pub use envelope::{Envelope, MalformedEnvelope, CONNECT_EVENT, HANDSHAKE_EVENT};
pub use errors::{ChannelError, ConfigError, ErrorKind, ReplyError, TransportError};
pub use peer::{ConnectionState, Counterpart, IdentityCheck, Peer, Role};
pub use registry::{EventRegistry, Fired, ListenerEntry, ListenerId};
pub use replier::{Replier, ReplySink};
pub use retired::RetiredCorrelations;
pub use value_objects::Timestamp;
