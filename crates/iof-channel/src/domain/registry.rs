//! # Event Registry
//!
//! Maps event names to ordered listener buckets. Each name owns a persistent
//! bucket and a separate once bucket so both kinds coexist for one name.
//!
//! Dispatch takes the once bucket out of the registry *before* anything is
//! invoked, so a once listener can never fire twice, even if it re-enters the
//! channel while running.
//!
//! The registry is generic over the stored callback types so it stays free of
//! channel plumbing; the service layer instantiates it with boxed closures.

use std::collections::HashMap;
use std::fmt;

/// Token identifying one registered listener, for precise removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Raw numeric value.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// One registered listener.
#[derive(Debug, Clone)]
pub struct ListenerEntry<F> {
    /// Removal token.
    pub id: ListenerId,
    /// Callback.
    pub callback: F,
}

#[derive(Debug)]
struct Bucket<P, O> {
    persistent: Vec<ListenerEntry<P>>,
    once: Vec<ListenerEntry<O>>,
}

impl<P, O> Bucket<P, O> {
    fn is_empty(&self) -> bool {
        self.persistent.is_empty() && self.once.is_empty()
    }

    fn len(&self) -> usize {
        self.persistent.len() + self.once.len()
    }
}

impl<P, O> Default for Bucket<P, O> {
    fn default() -> Self {
        Self {
            persistent: Vec::new(),
            once: Vec::new(),
        }
    }
}

/// Listeners selected for one dispatch, in invocation order.
#[derive(Debug)]
pub struct Fired<P, O> {
    /// Once listeners, already removed from the registry. Invoke first.
    pub once: Vec<O>,
    /// Persistent listeners, still registered.
    pub persistent: Vec<P>,
}

impl<P, O> Fired<P, O> {
    /// Total number of listeners selected.
    #[must_use]
    pub fn len(&self) -> usize {
        self.once.len() + self.persistent.len()
    }

    /// Whether nothing was selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.once.is_empty() && self.persistent.is_empty()
    }
}

/// Event name -> listener buckets.
#[derive(Debug)]
pub struct EventRegistry<P, O> {
    buckets: HashMap<String, Bucket<P, O>>,
    next_id: u64,
}

impl<P: Clone, O> EventRegistry<P, O> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buckets: HashMap::new(),
            next_id: 1,
        }
    }

    /// Allocate a listener id without registering anything.
    ///
    /// Used for listeners kept outside the registry (error listeners) so ids
    /// stay unique per channel.
    pub fn allocate_id(&mut self) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Append a persistent listener.
    pub fn on(&mut self, event: &str, callback: P) -> ListenerId {
        let id = self.allocate_id();
        self.buckets
            .entry(event.to_string())
            .or_default()
            .persistent
            .push(ListenerEntry { id, callback });
        id
    }

    /// Append a once listener.
    pub fn once(&mut self, event: &str, callback: O) -> ListenerId {
        let id = self.allocate_id();
        self.buckets
            .entry(event.to_string())
            .or_default()
            .once
            .push(ListenerEntry { id, callback });
        id
    }

    /// Remove every listener (persistent and once) for `event`.
    ///
    /// Returns the number removed.
    pub fn off(&mut self, event: &str) -> usize {
        self.buckets.remove(event).map_or(0, |bucket| bucket.len())
    }

    /// Remove exactly one listener.
    pub fn off_listener(&mut self, id: ListenerId) -> bool {
        let mut emptied = None;
        let mut removed = false;

        for (event, bucket) in &mut self.buckets {
            let before = bucket.len();
            bucket.persistent.retain(|entry| entry.id != id);
            bucket.once.retain(|entry| entry.id != id);
            if bucket.len() != before {
                removed = true;
                if bucket.is_empty() {
                    emptied = Some(event.clone());
                }
                break;
            }
        }

        if let Some(event) = emptied {
            self.buckets.remove(&event);
        }
        removed
    }

    /// Remove everything. Returns the number of listeners removed.
    pub fn clear(&mut self) -> usize {
        let count = self.len();
        self.buckets.clear();
        count
    }

    /// Select listeners for one dispatch of `event`.
    ///
    /// The once bucket is removed from the registry; persistent listeners are
    /// cloned and stay registered. `None` if nothing listens.
    pub fn take_for_dispatch(&mut self, event: &str) -> Option<Fired<P, O>> {
        let bucket = self.buckets.get_mut(event)?;
        let once: Vec<O> = std::mem::take(&mut bucket.once)
            .into_iter()
            .map(|entry| entry.callback)
            .collect();
        let persistent: Vec<P> = bucket
            .persistent
            .iter()
            .map(|entry| entry.callback.clone())
            .collect();

        if bucket.is_empty() {
            self.buckets.remove(event);
        }

        let fired = Fired { once, persistent };
        if fired.is_empty() {
            None
        } else {
            Some(fired)
        }
    }

    /// Whether any listener is registered for `event`.
    #[must_use]
    pub fn has_listeners(&self, event: &str) -> bool {
        self.buckets.get(event).is_some_and(|b| !b.is_empty())
    }

    /// Number of listeners registered for `event`.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.buckets.get(event).map_or(0, Bucket::len)
    }

    /// Total number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.values().map(Bucket::len).sum()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

impl<P: Clone, O> Default for EventRegistry<P, O> {
    fn default() -> Self {
        Self::new()
    }
}
