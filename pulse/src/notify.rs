//! Change notification fabric shared by the stores and the segmented model.
//!
//! Both store flavors raise change notifications so an attached consumer (a
//! chart refresh loop, typically) can react to membership and boundary
//! changes without polling. [`SubscriberSet`] is the registry; the payloads
//! are [`StoreDiff`] for the flat stores and [`ModelEvent`] for the
//! sink/channel/segment hierarchy.
//!
//! # Reentrancy contract
//!
//! [`SubscriberSet::emit`] runs callbacks with **no store lock held**: the
//! emitting store finishes its mutation, releases its lock, and only then
//! notifies. A callback may therefore call back into the store that notified
//! it (querying a range from a diff handler is fine). Two hazards follow and
//! are contract, not bugs:
//!
//! - A handler re-entering the store may observe sibling state that has not
//!   propagated yet; notifications are per-entity, not tree-consistent.
//! - A handler that blocks waiting on work which itself needs the store's
//!   lock can still deadlock. No lock acquisition has a timeout.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::segment::SegmentId;

/// Handle identifying one subscription, returned by
/// [`SubscriberSet::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Registry of change callbacks for one event type.
///
/// Subscribing and unsubscribing are O(n) over the subscriber list and take
/// the registry's own lock; `emit` clones the callback list out of that lock
/// and invokes every callback lock-free, in subscription order.
pub struct SubscriberSet<E> {
    subscribers: Mutex<Vec<(SubscriptionId, Callback<E>)>>,
    next_id: AtomicU64,
}

impl<E> std::fmt::Debug for SubscriberSet<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberSet")
            .field("len", &self.len())
            .finish()
    }
}

impl<E> Default for SubscriberSet<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> SubscriberSet<E> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a callback; returns its id for later removal.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::new(callback)));
        id
    }

    /// Removes a subscription. Returns `false` if the id was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no subscribers are registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Invokes every subscriber with the event, in subscription order.
    ///
    /// The registry lock is released before the first callback runs, so a
    /// callback may subscribe, unsubscribe, or re-enter the emitting store.
    /// See the module docs for the reentrancy contract.
    pub fn emit(&self, event: &E) {
        let callbacks: Vec<Callback<E>> = self
            .lock()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in callbacks {
            callback(event);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, Callback<E>)>> {
        // A subscriber list is valid at every unwind point; recover the data.
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Combined membership diff raised by a store mutation.
///
/// Each membership-changing operation raises at most one diff per logical
/// operation; a diff with both lists empty is never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreDiff<T> {
    /// Samples added by the operation, in append order.
    pub added: Vec<T>,
    /// Samples removed by the operation, grouped by channel in channel
    /// declaration order, chronological within each channel.
    pub removed: Vec<T>,
}

impl<T> StoreDiff<T> {
    /// Whether the diff carries no change.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Lifecycle and boundary notifications raised by the segmented model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    /// A channel was created in a sink.
    ChannelCreated {
        /// The owning sink's name.
        sink: String,
        /// The new channel's name.
        channel: String,
    },
    /// An editable segment was opened for a `(channel, group)` pair.
    SegmentOpened {
        /// The owning channel's name.
        channel: String,
        /// The group the segment belongs to.
        group: String,
        /// The new segment's id.
        segment: SegmentId,
    },
    /// A segment transitioned to closed.
    SegmentClosed {
        /// The owning channel's name.
        channel: String,
        /// The group the segment belongs to.
        group: String,
        /// The closed segment's id.
        segment: SegmentId,
    },
    /// A segment append raised its channel's aggregate end time.
    BoundaryChanged {
        /// The owning channel's name.
        channel: String,
        /// The segment whose append raised the boundary.
        segment: SegmentId,
        /// The new aggregate end time, in nanoseconds.
        end_ns: u64,
    },
    /// A channel transitioned to closed.
    ChannelClosed {
        /// The closed channel's name.
        channel: String,
    },
    /// A sink transitioned to closed.
    SinkClosed {
        /// The closed sink's name.
        sink: String,
    },
}
