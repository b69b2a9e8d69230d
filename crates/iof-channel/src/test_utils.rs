//! Test utilities for the channel.
//!
//! Deterministic clocks for exercising reply and handshake timeouts.
//! Enable with the `test-utils` feature flag.
//!
//! # Example
//!
//! ```rust
//! use iof_channel::test_utils::ControllableTimeSource;
//! use iof_channel::TimeSource;
//! use std::time::Duration;
//!
//! let clock = ControllableTimeSource::new(1_000);
//! clock.advance(Duration::from_millis(250));
//! assert_eq!(clock.now().as_millis(), 1_250);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::Timestamp;
use crate::ports::outbound::TimeSource;

/// A time source that returns a fixed timestamp (milliseconds).
#[derive(Debug, Clone)]
pub struct FixedTimeSource {
    timestamp: u64,
}

impl FixedTimeSource {
    /// Create a new fixed time source.
    pub fn new(timestamp: u64) -> Self {
        Self { timestamp }
    }

    /// Get the configured timestamp value.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }
}

impl TimeSource for FixedTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.timestamp)
    }
}

/// A clock tests move forward by hand.
///
/// Clones share the same time, so a test can keep one handle and give the
/// other to a channel.
#[derive(Debug, Clone, Default)]
pub struct ControllableTimeSource {
    time: Arc<AtomicU64>,
}

impl ControllableTimeSource {
    /// Start at `initial` milliseconds.
    pub fn new(initial: u64) -> Self {
        Self {
            time: Arc::new(AtomicU64::new(initial)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let millis = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.time.fetch_add(millis, Ordering::SeqCst);
    }

    /// Jump to an absolute time.
    pub fn set(&self, millis: u64) {
        self.time.store(millis, Ordering::SeqCst);
    }
}

impl TimeSource for ControllableTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.time.load(Ordering::SeqCst))
    }
}
