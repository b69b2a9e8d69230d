//! Paired-session fixture shared by the integration scenarios.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

use iof_channel::adapters::{ContextId, HubEndpoint, MessageHub};
use iof_channel::test_utils::ControllableTimeSource;
use iof_channel::{ChannelBuilder, ChannelConfig, InboundPort, Initiator, Responder};

pub const HOST_ORIGIN: &str = "https://host.example";
pub const FRAME_ORIGIN: &str = "https://frame.example";
pub const EVIL_ORIGIN: &str = "https://evil.example";

/// Install a test-writer subscriber once. Honors `RUST_LOG`.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A host document and an embedded frame sharing one hub and one clock.
pub struct Session {
    pub hub: MessageHub,
    pub clock: ControllableTimeSource,
    pub host: Initiator<HubEndpoint>,
    pub frame: Responder<HubEndpoint>,
    pub host_id: ContextId,
    pub frame_id: ContextId,
}

impl Session {
    /// Create both sides. The host's handshake is queued, not delivered.
    pub fn open(config: ChannelConfig) -> Self {
        init_test_logging();

        let hub = MessageHub::new();
        let clock = ControllableTimeSource::new(0);
        let host_ep = hub.open_context(HOST_ORIGIN);
        let frame_ep = hub.open_context(FRAME_ORIGIN);
        let (host_id, frame_id) = (host_ep.id(), frame_ep.id());

        let frame = ChannelBuilder::new(frame_ep)
            .config(config.clone().with_log_prefix("frame"))
            .time_source(clock.clone())
            .listen(Some(HOST_ORIGIN.to_string()))
            .expect("frame listens");
        let host = ChannelBuilder::new(host_ep)
            .config(config.with_log_prefix("host"))
            .time_source(clock.clone())
            .initiate(frame_id, FRAME_ORIGIN)
            .expect("host initiates");

        Self {
            hub,
            clock,
            host,
            frame,
            host_id,
            frame_id,
        }
    }

    /// Create both sides and complete the handshake.
    pub fn open_connected() -> Self {
        let session = Self::open(ChannelConfig::default());
        session.pump();
        assert!(session.host.is_connected(), "host connected");
        assert!(session.frame.is_connected(), "frame connected");
        session
    }

    /// Deliver until both inboxes are empty.
    pub fn pump(&self) -> usize {
        let ports: [(ContextId, &dyn InboundPort<ContextId>); 2] =
            [(self.host_id, &self.host), (self.frame_id, &self.frame)];
        self.hub.run_until_idle(&ports)
    }
}

/// Thread-safe list of observations made inside callbacks.
#[derive(Debug)]
pub struct Recorder<T> {
    items: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T: Clone> Recorder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: T) {
        self.items.lock().push(item);
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.items.lock().clone()
    }
}
