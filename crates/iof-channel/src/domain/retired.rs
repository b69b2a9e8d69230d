//! # Retired Correlation Cache
//!
//! Remembers correlation ids that were already answered or expired so that a
//! second reply for the same id is recognized and dropped instead of being
//! dispatched as an ordinary event.
//!
//! Entries are kept for a bounded window and garbage-collected periodically,
//! which keeps memory bounded while still catching late duplicates.

use std::collections::HashMap;
use std::time::Duration;

use crate::domain::correlation::CorrelationId;
use crate::domain::value_objects::Timestamp;

/// Time-bounded set of consumed correlation ids.
#[derive(Debug)]
pub struct RetiredCorrelations {
    /// Map of correlation id -> time it was retired.
    cache: HashMap<CorrelationId, Timestamp>,
    /// How long a retired id is remembered.
    window: Duration,
    /// Last garbage collection.
    last_gc: Timestamp,
    /// Interval between garbage collections.
    gc_interval: Duration,
}

impl RetiredCorrelations {
    /// Default retention window.
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(120);

    /// Default garbage collection interval.
    pub const DEFAULT_GC_INTERVAL: Duration = Duration::from_secs(10);

    /// Create a cache with the default window.
    #[must_use]
    pub fn new() -> Self {
        Self::with_window(Self::DEFAULT_WINDOW)
    }

    /// Create a cache remembering ids for `window`.
    #[must_use]
    pub fn with_window(window: Duration) -> Self {
        Self {
            cache: HashMap::new(),
            window,
            last_gc: Timestamp::default(),
            gc_interval: Self::DEFAULT_GC_INTERVAL.min(window),
        }
    }

    /// Mark `cid` as consumed at `now`.
    pub fn retire(&mut self, cid: CorrelationId, now: Timestamp) {
        self.maybe_gc(now);
        self.cache.insert(cid, now);
    }

    /// Whether `cid` was retired within the window ending at `now`.
    #[must_use]
    pub fn contains(&self, cid: &CorrelationId, now: Timestamp) -> bool {
        self.cache
            .get(cid)
            .is_some_and(|retired_at| now < retired_at.saturating_add(self.window))
    }

    /// Number of remembered ids (including ones awaiting collection).
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether nothing is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    fn maybe_gc(&mut self, now: Timestamp) {
        if now.duration_since(self.last_gc) < self.gc_interval {
            return;
        }
        let window = self.window;
        self.cache
            .retain(|_, retired_at| now < retired_at.saturating_add(window));
        self.last_gc = now;
    }
}

impl Default for RetiredCorrelations {
    fn default() -> Self {
        Self::new()
    }
}
