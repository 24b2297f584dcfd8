//! Fixed-capacity ring store for one logical metric series.
//!
//! [`SampleRing`] is a circular buffer with strict chronological insertion
//! and live extent tracking. Once the buffer is full, each accepted push
//! overwrites the oldest slot, so the contents are always the most recent
//! `capacity` accepted samples in chronological order.
//!
//! # Design
//!
//! - Insertion order is strictly increasing by capture time; an out-of-order
//!   push is rejected with no state change.
//! - Extents are maintained incrementally on push. When an overwritten sample
//!   sat on one of the current extremes, the extents are rebuilt by a full
//!   scan of the remaining contents; otherwise the new sample is merged in
//!   O(1).
//! - Wraparound is handled as at most two contiguous span copies on every
//!   read path; no read ever hands out a live reference to internal storage.
//!
//! # Thread safety
//!
//! One mutex per instance serializes all mutation and extent reads. Reads
//! return copies; producers and consumers interleave only at the lock.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{QueryError, Result, RingError};
use crate::sample::{Extents, MetricSample};
use crate::search::partition_index;

/// Fixed-capacity circular buffer of metric samples with live extents.
///
/// # Examples
///
/// ```rust
/// use pulse::{ChannelId, MetricSample, SampleRing};
///
/// # fn main() -> pulse::Result<()> {
/// let ring = SampleRing::new(3);
/// for t in 1..=5u64 {
///     ring.push(MetricSample::new(t, ChannelId(0), t as i64 * 10))?;
/// }
///
/// // Only the 3 most recent samples survive.
/// let contents = ring.to_vec();
/// assert_eq!(contents.len(), 3);
/// assert_eq!(contents[0].captured_at_ns, 3);
/// assert_eq!(ring.extents().unwrap().max_value, 50);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SampleRing {
    inner: Mutex<RingInner>,
}

#[derive(Debug)]
struct RingInner {
    /// Physical storage. Grows to `capacity` during the fill phase and keeps
    /// that length afterwards; `head` is meaningful only once full.
    slots: Vec<MetricSample>,
    capacity: usize,
    /// Physical index of the oldest sample once the buffer has filled.
    head: usize,
    /// Capture time of the last accepted sample; the monotonic cursor.
    last_ns: Option<u64>,
    extents: Option<Extents>,
}

impl SampleRing {
    /// Creates an empty ring with the given fixed capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be non-zero");
        Self {
            inner: Mutex::new(RingInner {
                slots: Vec::with_capacity(capacity),
                capacity,
                head: 0,
                last_ns: None,
                extents: None,
            }),
        }
    }

    /// Appends a sample, overwriting the oldest slot when full.
    ///
    /// # Errors
    ///
    /// Returns [`RingError::OutOfOrder`] if the sample's capture time is not
    /// strictly after the last accepted one; the buffer is unchanged.
    pub fn push(&self, sample: MetricSample) -> Result<()> {
        self.lock().accept(sample)?;
        Ok(())
    }

    /// Non-erroring variant of [`push`](Self::push): returns `false` instead
    /// of an error when the sample is out of order.
    pub fn try_push(&self, sample: MetricSample) -> bool {
        self.lock().accept(sample).is_ok()
    }

    /// Number of samples currently held.
    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    /// Whether the ring holds no samples.
    pub fn is_empty(&self) -> bool {
        self.lock().slots.is_empty()
    }

    /// The fixed capacity.
    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    /// Current value/time extents, or `None` when empty.
    pub fn extents(&self) -> Option<Extents> {
        self.lock().extents
    }

    /// Capture time of the most recently accepted sample.
    pub fn last_captured_ns(&self) -> Option<u64> {
        self.lock().last_ns
    }

    /// Copies out all samples, oldest to newest.
    pub fn to_vec(&self) -> Vec<MetricSample> {
        let inner = self.lock();
        let mut out = Vec::with_capacity(inner.slots.len());
        out.extend_from_slice(&inner.slots[inner.head..]);
        out.extend_from_slice(&inner.slots[..inner.head]);
        out
    }

    /// Copies the samples with capture time in `[min_ns, max_ns]` into
    /// `dest`, oldest to newest, returning the number copied.
    ///
    /// The boundaries are located by binary search over the logical
    /// (wraparound-mapped) sequence; the copy splits into two contiguous
    /// spans when the matching run wraps the physical array boundary.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidTimeRange`] if `min_ns > max_ns`. The
    /// windowed store coerces inverted ranges instead; the ring is the
    /// stricter of the two by design.
    pub fn copy_range(&self, min_ns: u64, max_ns: u64, dest: &mut Vec<MetricSample>) -> Result<usize> {
        if min_ns > max_ns {
            return Err(QueryError::InvalidTimeRange { min_ns, max_ns }.into());
        }
        let inner = self.lock();
        let len = inner.slots.len();
        if len == 0 {
            return Ok(0);
        }

        let start = partition_index(len, |i| inner.at(i).captured_at_ns < min_ns);
        let end_exclusive = partition_index(len, |i| inner.at(i).captured_at_ns <= max_ns);
        if start >= end_exclusive {
            return Ok(0);
        }
        let count = end_exclusive - start;

        let physical_start = (inner.head + start) % inner.capacity;
        if physical_start + count <= inner.slots.len() {
            dest.extend_from_slice(&inner.slots[physical_start..physical_start + count]);
        } else {
            let first_span = inner.slots.len() - physical_start;
            dest.extend_from_slice(&inner.slots[physical_start..]);
            dest.extend_from_slice(&inner.slots[..count - first_span]);
        }
        Ok(count)
    }

    /// Like [`copy_range`](Self::copy_range) but returns a fresh vector.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidTimeRange`] if `min_ns > max_ns`.
    pub fn range_to_vec(&self, min_ns: u64, max_ns: u64) -> Result<Vec<MetricSample>> {
        let mut out = Vec::new();
        self.copy_range(min_ns, max_ns, &mut out)?;
        Ok(out)
    }

    /// Resets count, extents, and the monotonic cursor. The backing storage
    /// keeps its allocation.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.slots.clear();
        inner.head = 0;
        inner.last_ns = None;
        inner.extents = None;
    }

    /// Replaces this ring's contents with a snapshot of `other`, retaining
    /// only the most recent `min(capacity, other.len())` samples and
    /// rebuilding extents by a full rescan.
    ///
    /// The snapshot of `other` is taken before this ring's lock is acquired,
    /// so the two rings are never locked at once.
    pub fn copy_from(&self, other: &SampleRing) {
        let snapshot = other.to_vec();
        let mut inner = self.lock();
        let skip = snapshot.len().saturating_sub(inner.capacity);
        inner.slots.clear();
        inner.head = 0;
        inner.slots.extend_from_slice(&snapshot[skip..]);
        inner.extents = Extents::scan(inner.slots.iter());
        inner.last_ns = inner.slots.last().map(|s| s.captured_at_ns);
    }

    fn lock(&self) -> MutexGuard<'_, RingInner> {
        // Every mutation completes before the guard drops; poisoned state is
        // still internally consistent, so recover the data.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RingInner {
    /// Sample at logical index `i` (0 = oldest).
    fn at(&self, i: usize) -> &MetricSample {
        &self.slots[(self.head + i) % self.capacity]
    }

    fn accept(&mut self, sample: MetricSample) -> std::result::Result<(), RingError> {
        if let Some(last_ns) = self.last_ns
            && sample.captured_at_ns <= last_ns
        {
            return Err(RingError::OutOfOrder {
                last_ns,
                attempted_ns: sample.captured_at_ns,
            });
        }

        if self.slots.len() < self.capacity {
            self.slots.push(sample);
            match &mut self.extents {
                Some(extents) => extents.merge(&sample),
                None => self.extents = Some(Extents::of(&sample)),
            }
        } else {
            let overwritten = std::mem::replace(&mut self.slots[self.head], sample);
            self.head = (self.head + 1) % self.capacity;

            let overwrote_extreme = self
                .extents
                .as_ref()
                .is_some_and(|extents| extents.is_extremal(&overwritten));
            if overwrote_extreme {
                self.extents = Extents::scan(self.slots.iter());
            } else if let Some(extents) = &mut self.extents {
                extents.merge(&sample);
            }
        }

        self.last_ns = Some(sample.captured_at_ns);
        Ok(())
    }
}
