//! Windowed per-channel store with sliding-time retention.
//!
//! [`WindowStore`] keeps one append-ordered list of samples per channel,
//! evicts from the front of each list when trimming against a retention
//! cutoff, and answers inclusive time-range queries either as copies
//! ([`WindowStore::query_range`]) or as call-scoped borrowed views
//! ([`WindowStore::use_range`]). Channels are declared at construction and
//! immutable afterwards.
//!
//! # Design
//!
//! - One coarse mutex guards all channels collectively; a query observes a
//!   consistent snapshot of the channel it touches, but two queries in
//!   separate calls may observe different store states.
//! - Appends are assumed (not re-verified) to arrive in non-decreasing
//!   capture-time order per channel; eviction pops from the front of each
//!   list, which is valid only because of that ordering.
//! - Range boundaries are located once, by the bound searches in
//!   [`crate::search`]; the copying and borrowing query paths share that
//!   location code.
//! - An inverted query range (`from > to`) is coerced to the empty range at
//!   `from`, unlike the ring store which rejects it. The asymmetry is
//!   inherited behavior, kept deliberately.
//!
//! # Notifications
//!
//! Every membership-changing operation raises at most one combined
//! [`StoreDiff`] — `append` with the one added sample, `trim_expired` with
//! every evicted sample across channels — and never raises a diff with both
//! lists empty. Diffs are emitted **after** the store lock is released; see
//! [`crate::notify`] for the reentrancy contract.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{ChannelError, Result};
use crate::notify::{StoreDiff, SubscriberSet, SubscriptionId};
use crate::sample::{ChannelConfig, ChannelId, RetentionWindow, Sample};
use crate::search::inclusive_range;

/// Per-channel sample store with sliding-window retention.
///
/// Generic over the sample type: instantiate with [`crate::MetricSample`]
/// for numeric series and [`crate::EventSample`] for labeled markers.
///
/// # Examples
///
/// ```rust
/// use pulse::{ChannelConfig, ChannelId, MetricSample, RetentionWindow, WindowStore};
///
/// # fn main() -> pulse::Result<()> {
/// let store = WindowStore::new(
///     RetentionWindow::from_secs(10),
///     vec![ChannelConfig::new(0, "memory", "#4078c0")],
/// )?;
///
/// store.append(MetricSample::new(1_000_000_000, ChannelId(0), 42))?;
/// let hits = store.query_range(ChannelId(0), 0, u64::MAX)?;
/// assert_eq!(hits.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct WindowStore<T: Sample> {
    retention: RetentionWindow,
    channels: Vec<ChannelConfig>,
    slots: HashMap<ChannelId, usize>,
    inner: Mutex<WindowInner<T>>,
    subscribers: SubscriberSet<StoreDiff<T>>,
}

struct WindowInner<T> {
    /// One chronological list per channel, indexed like `channels`.
    lists: Vec<Vec<T>>,
    /// Store-wide min/max capture time across all channels. Updated on
    /// append only: trimming does not lower the minimum (inherited
    /// behavior, see [`WindowStore::time_bounds`]).
    bounds: Option<(u64, u64)>,
}

impl<T: Sample> fmt::Debug for WindowStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowStore")
            .field("retention", &self.retention)
            .field("channels", &self.channels.len())
            .finish()
    }
}

impl<T: Sample> WindowStore<T> {
    /// Creates a store over the given retention window and channel set.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::DuplicateChannel`] if two configurations
    /// share an id, or [`ChannelError::EmptyChannelName`] for a nameless
    /// channel.
    pub fn new(retention: RetentionWindow, channels: Vec<ChannelConfig>) -> Result<Self> {
        let mut slots = HashMap::with_capacity(channels.len());
        for (slot, config) in channels.iter().enumerate() {
            if config.name.is_empty() {
                return Err(ChannelError::EmptyChannelName { channel: config.id }.into());
            }
            if slots.insert(config.id, slot).is_some() {
                return Err(ChannelError::DuplicateChannel { channel: config.id }.into());
            }
        }
        let lists = channels.iter().map(|_| Vec::new()).collect();
        Ok(Self {
            retention,
            channels,
            slots,
            inner: Mutex::new(WindowInner {
                lists,
                bounds: None,
            }),
            subscribers: SubscriberSet::new(),
        })
    }

    /// The retention window the store trims against.
    pub fn retention(&self) -> RetentionWindow {
        self.retention
    }

    /// The channel configurations, in declaration order.
    pub fn channels(&self) -> &[ChannelConfig] {
        &self.channels
    }

    /// Looks up one channel's configuration.
    pub fn channel_config(&self, channel: ChannelId) -> Option<&ChannelConfig> {
        self.slots.get(&channel).map(|&slot| &self.channels[slot])
    }

    /// Appends a sample to its channel's list and raises an added diff.
    ///
    /// Samples are assumed to arrive in non-decreasing capture-time order
    /// per channel; this is not re-verified here.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::UnknownChannel`] if the sample's channel was
    /// not declared at construction.
    pub fn append(&self, sample: T) -> Result<()> {
        let slot = self.slot(sample.channel())?;
        {
            let mut inner = self.lock();
            let t = sample.captured_at_ns();
            inner.lists[slot].push(sample.clone());
            inner.bounds = Some(match inner.bounds {
                None => (t, t),
                Some((lo, hi)) => (lo.min(t), hi.max(t)),
            });
        }
        self.subscribers.emit(&StoreDiff {
            added: vec![sample],
            removed: Vec::new(),
        });
        Ok(())
    }

    /// Evicts every sample with capture time before `cutoff_ns`, across all
    /// channels, returning the number evicted.
    ///
    /// Eviction pops from the front of each chronological list. All
    /// removals are aggregated into one removed diff; nothing is raised
    /// when nothing was evicted.
    pub fn trim_expired(&self, cutoff_ns: u64) -> usize {
        let removed = {
            let mut inner = self.lock();
            let mut removed = Vec::new();
            for list in &mut inner.lists {
                let mut expired = 0;
                while expired < list.len() && list[expired].captured_at_ns() < cutoff_ns {
                    expired += 1;
                }
                if expired > 0 {
                    removed.extend(list.drain(..expired));
                }
            }
            removed
        };

        let count = removed.len();
        if count > 0 {
            tracing::debug!(count, cutoff_ns, "evicted expired samples");
            self.subscribers.emit(&StoreDiff {
                added: Vec::new(),
                removed,
            });
        }
        count
    }

    /// Trims against the store's own retention window at the given current
    /// time: shorthand for `trim_expired(retention.cutoff_ns(now_ns))`.
    pub fn trim_to(&self, now_ns: u64) -> usize {
        self.trim_expired(self.retention.cutoff_ns(now_ns))
    }

    /// Copies out the samples of `channel` with capture time in
    /// `[from_ns, to_ns]`, in chronological order.
    ///
    /// An inverted range (`from_ns > to_ns`) is coerced to the empty range
    /// at `from_ns` rather than rejected. When the requested range covers
    /// the channel's full known bounds the whole list is cloned without a
    /// search.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::UnknownChannel`] for an undeclared channel,
    /// or [`crate::QueryError::Unsorted`] if the channel's list fails the
    /// cheap order check (a producer violated the append-order assumption).
    pub fn query_range(&self, channel: ChannelId, from_ns: u64, to_ns: u64) -> Result<Vec<T>> {
        let slot = self.slot(channel)?;
        let (from_ns, to_ns) = coerce(from_ns, to_ns);
        let inner = self.lock();
        let list = &inner.lists[slot];

        let Some((first, last)) = list.first().zip(list.last()) else {
            return Ok(Vec::new());
        };
        if from_ns <= first.captured_at_ns() && to_ns >= last.captured_at_ns() {
            return Ok(list.clone());
        }
        match inclusive_range(list, from_ns, to_ns)? {
            Some((start, end)) => Ok(list[start..=end].to_vec()),
            None => Ok(Vec::new()),
        }
    }

    /// Passes a borrowed, read-only view of the matching range to `f`.
    ///
    /// The view is scoped to the call: it borrows the store's internal list
    /// and cannot be retained past the callback. `f` runs **under the store
    /// lock** — it must not call any mutating method of this store, and it
    /// must not block on work that does, or it will deadlock.
    ///
    /// # Errors
    ///
    /// Same conditions as [`query_range`](Self::query_range).
    pub fn use_range<R>(
        &self,
        channel: ChannelId,
        from_ns: u64,
        to_ns: u64,
        f: impl FnOnce(&[T]) -> R,
    ) -> Result<R> {
        let slot = self.slot(channel)?;
        let (from_ns, to_ns) = coerce(from_ns, to_ns);
        let inner = self.lock();
        let list = &inner.lists[slot];
        let view: &[T] = match inclusive_range(list, from_ns, to_ns)? {
            Some((start, end)) => &list[start..=end],
            None => &[],
        };
        Ok(f(view))
    }

    /// Number of samples currently held for `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::UnknownChannel`] for an undeclared channel.
    pub fn len(&self, channel: ChannelId) -> Result<usize> {
        let slot = self.slot(channel)?;
        Ok(self.lock().lists[slot].len())
    }

    /// Store-wide `(min, max)` capture time across all channels, or `None`
    /// before the first append.
    ///
    /// The bounds are an append-side ratchet: trimming does not lower the
    /// minimum. They describe everything the store has seen, not
    /// necessarily what it still holds.
    pub fn time_bounds(&self) -> Option<(u64, u64)> {
        self.lock().bounds
    }

    /// Registers a diff callback. See [`crate::notify`] for the contract.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&StoreDiff<T>) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    /// Removes a diff callback.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    fn slot(&self, channel: ChannelId) -> Result<usize> {
        self.slots
            .get(&channel)
            .copied()
            .ok_or_else(|| ChannelError::UnknownChannel { channel }.into())
    }

    fn lock(&self) -> MutexGuard<'_, WindowInner<T>> {
        // Mutations never leave a list mid-invariant at an unwind point;
        // recover the data on poison.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Inverted ranges collapse to the empty range at `from`.
fn coerce(from_ns: u64, to_ns: u64) -> (u64, u64) {
    if from_ns > to_ns {
        (from_ns, from_ns)
    } else {
        (from_ns, to_ns)
    }
}
