//! Segmented channel model: sink → channel → segment hierarchy.
//!
//! The segmented variant of the store partitions a channel's data into
//! discrete, independently closable runs. A [`Sink`] owns named
//! [`Channel`]s (created on demand, unique by name); each channel owns the
//! [`Segment`]s opened for its groups. Everything is created editable and
//! transitions to closed exactly once; closing a parent force-closes its
//! still-open children first.
//!
//! # Locking
//!
//! Each entity owns one mutex over its own mutable state; no operation holds
//! two entity locks at once. Ownership is `Arc` down the tree and `Weak` up
//! it, so snapshots handed to consumers may outlive the live tree.
//!
//! # Aggregate end time
//!
//! A channel's end time aggregates its segments' end times as an explicit
//! **monotonic ratchet**: appends push a grown segment end upward to the
//! owning channel and sink, and the aggregate never decreases — a segment
//! whose own end shrinks through a removal rescan does not lower the
//! already-raised channel or sink value. There is no reset.
//! [`ModelEvent::BoundaryChanged`] fires on every upward raise, after the
//! locks involved are released.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::error::{LifecycleError, Result};
use crate::notify::{ModelEvent, SubscriberSet, SubscriptionId};
use crate::sample::Timestamped;
use crate::search::{first_at_or_after, last_at_or_before};

/// Opaque identity of a segment, unique within its sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentId(u64);

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One data point of a segment's run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataPoint {
    /// Capture time in nanoseconds since the Unix epoch.
    pub captured_at_ns: u64,
    /// The sampled value.
    pub value: i64,
}

impl DataPoint {
    /// Creates a new data point.
    pub fn new(captured_at_ns: u64, value: i64) -> Self {
        Self {
            captured_at_ns,
            value,
        }
    }
}

impl Timestamped for DataPoint {
    fn captured_at_ns(&self) -> u64 {
        self.captured_at_ns
    }
}

/// Pre-computed bounds of a batch of points, supplied by callers that
/// already know them to skip the O(k) derivation scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchBounds {
    /// Smallest value in the batch.
    pub min_value: i64,
    /// Largest value in the batch.
    pub max_value: i64,
    /// Latest capture time in the batch, in nanoseconds.
    pub end_ns: u64,
}

impl BatchBounds {
    /// Derives bounds by scanning a non-empty batch.
    fn derive(points: &[DataPoint]) -> Self {
        let mut min_value = i64::MAX;
        let mut max_value = i64::MIN;
        let mut end_ns = 0u64;
        for point in points {
            min_value = min_value.min(point.value);
            max_value = max_value.max(point.value);
            end_ns = end_ns.max(point.captured_at_ns);
        }
        Self {
            min_value,
            max_value,
            end_ns,
        }
    }
}

/// Root of the segmented model: owns channels, allocates segment ids, and
/// fans model events out to subscribers.
#[derive(Debug)]
pub struct Sink {
    name: String,
    events: Arc<SubscriberSet<ModelEvent>>,
    segment_ids: Arc<AtomicU64>,
    inner: Mutex<SinkInner>,
}

#[derive(Debug)]
struct SinkInner {
    channels: Vec<Arc<Channel>>,
    by_name: HashMap<String, usize>,
    end_ns: Option<u64>,
    closed: bool,
}

impl Sink {
    /// Creates a new, editable sink.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            events: Arc::new(SubscriberSet::new()),
            segment_ids: Arc::new(AtomicU64::new(1)),
            inner: Mutex::new(SinkInner {
                channels: Vec::new(),
                by_name: HashMap::new(),
                end_ns: None,
                closed: false,
            }),
        })
    }

    /// The sink's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the channel with the given name, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::SinkClosed`] once the sink is closed.
    pub fn create_channel(self: &Arc<Self>, name: &str) -> Result<Arc<Channel>> {
        let (channel, created) = {
            let mut inner = self.lock();
            if inner.closed {
                return Err(LifecycleError::SinkClosed {
                    sink: self.name.clone(),
                }
                .into());
            }
            if let Some(&slot) = inner.by_name.get(name) {
                (Arc::clone(&inner.channels[slot]), false)
            } else {
                let channel = Arc::new(Channel {
                    name: name.to_string(),
                    sink: Arc::downgrade(self),
                    events: Arc::clone(&self.events),
                    segment_ids: Arc::clone(&self.segment_ids),
                    inner: Mutex::new(ChannelInner {
                        segments: Vec::new(),
                        open_by_group: HashMap::new(),
                        end_ns: None,
                        closed: false,
                    }),
                });
                let slot = inner.channels.len();
                inner.by_name.insert(name.to_string(), slot);
                inner.channels.push(Arc::clone(&channel));
                (channel, true)
            }
        };
        if created {
            tracing::debug!(sink = %self.name, channel = name, "channel created");
            self.events.emit(&ModelEvent::ChannelCreated {
                sink: self.name.clone(),
                channel: name.to_string(),
            });
        }
        Ok(channel)
    }

    /// Looks up a channel by name without creating it.
    pub fn channel(&self, name: &str) -> Option<Arc<Channel>> {
        let inner = self.lock();
        inner
            .by_name
            .get(name)
            .map(|&slot| Arc::clone(&inner.channels[slot]))
    }

    /// All channels, in creation order.
    pub fn channels(&self) -> Vec<Arc<Channel>> {
        self.lock().channels.clone()
    }

    /// Aggregate end time over all channels: a monotonic ratchet that never
    /// decreases. `None` until the first point is appended anywhere.
    pub fn end_ns(&self) -> Option<u64> {
        self.lock().end_ns
    }

    /// Whether the sink has been closed.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Closes the sink, force-closing every still-open channel (and their
    /// segments) first. Idempotent: repeat calls do nothing and re-raise no
    /// events.
    pub fn close(&self) {
        let channels = {
            let mut inner = self.lock();
            if inner.closed {
                return;
            }
            inner.closed = true;
            inner.channels.clone()
        };
        for channel in &channels {
            channel.close();
        }
        tracing::debug!(sink = %self.name, "sink closed");
        self.events.emit(&ModelEvent::SinkClosed {
            sink: self.name.clone(),
        });
    }

    /// Registers a model-event callback. See [`crate::notify`] for the
    /// reentrancy contract.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ModelEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(callback)
    }

    /// Removes a model-event callback.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Ratchets the sink-level aggregate end time upward.
    fn observe_end_ns(&self, end_ns: u64) {
        let mut inner = self.lock();
        if inner.end_ns.is_none_or(|current| end_ns > current) {
            inner.end_ns = Some(end_ns);
        }
    }

    fn lock(&self) -> MutexGuard<'_, SinkInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A named partition of the segmented model, owning one segment run per
/// group plus the closed historical ones.
#[derive(Debug)]
pub struct Channel {
    name: String,
    sink: Weak<Sink>,
    events: Arc<SubscriberSet<ModelEvent>>,
    segment_ids: Arc<AtomicU64>,
    inner: Mutex<ChannelInner>,
}

#[derive(Debug)]
struct ChannelInner {
    segments: Vec<Arc<Segment>>,
    open_by_group: HashMap<String, Arc<Segment>>,
    end_ns: Option<u64>,
    closed: bool,
}

impl Channel {
    /// The channel's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opens a new editable segment for `group`, closing the group's
    /// currently open segment first if one exists.
    ///
    /// At most one editable segment per `(channel, group)` pair exists at
    /// any observation point. Raises [`ModelEvent::SegmentClosed`] for the
    /// displaced segment (when any) and [`ModelEvent::SegmentOpened`] for
    /// the new one, in that order.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::ChannelClosed`] once the channel is closed.
    pub fn open_segment(self: &Arc<Self>, group: &str, start_ns: u64) -> Result<Arc<Segment>> {
        let (segment, displaced) = {
            let mut inner = self.lock();
            if inner.closed {
                return Err(LifecycleError::ChannelClosed {
                    channel: self.name.clone(),
                }
                .into());
            }
            let id = SegmentId(self.segment_ids.fetch_add(1, Ordering::Relaxed));
            let segment = Arc::new(Segment {
                id,
                group: group.to_string(),
                channel_name: self.name.clone(),
                channel: Arc::downgrade(self),
                inner: Mutex::new(SegmentInner {
                    points: Vec::new(),
                    start_ns,
                    end_ns: None,
                    min_value: None,
                    max_value: None,
                    editable: true,
                }),
            });
            let displaced = inner
                .open_by_group
                .insert(group.to_string(), Arc::clone(&segment));
            inner.segments.push(Arc::clone(&segment));
            (segment, displaced)
        };

        if let Some(old) = displaced {
            old.mark_closed();
            self.events.emit(&ModelEvent::SegmentClosed {
                channel: self.name.clone(),
                group: group.to_string(),
                segment: old.id,
            });
        }
        tracing::debug!(channel = %self.name, group, segment = %segment.id, "segment opened");
        self.events.emit(&ModelEvent::SegmentOpened {
            channel: self.name.clone(),
            group: group.to_string(),
            segment: segment.id,
        });
        Ok(segment)
    }

    /// The currently open segment for `group`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::ChannelClosed`] once the channel is closed.
    pub fn current_segment(&self, group: &str) -> Result<Option<Arc<Segment>>> {
        let inner = self.lock();
        if inner.closed {
            return Err(LifecycleError::ChannelClosed {
                channel: self.name.clone(),
            }
            .into());
        }
        Ok(inner.open_by_group.get(group).cloned())
    }

    /// Closes the given segment.
    ///
    /// If it is the currently open segment of its group, the group has no
    /// open segment afterwards. Closing a segment that is already closed is
    /// a no-op (no event is re-raised).
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::ChannelClosed`] once the channel is closed.
    pub fn close_segment(&self, segment: &Segment) -> Result<()> {
        {
            let mut inner = self.lock();
            if inner.closed {
                return Err(LifecycleError::ChannelClosed {
                    channel: self.name.clone(),
                }
                .into());
            }
            let is_current = inner
                .open_by_group
                .get(&segment.group)
                .is_some_and(|open| open.id == segment.id);
            if is_current {
                inner.open_by_group.remove(&segment.group);
            }
        }
        if segment.mark_closed() {
            self.events.emit(&ModelEvent::SegmentClosed {
                channel: self.name.clone(),
                group: segment.group.clone(),
                segment: segment.id,
            });
        }
        Ok(())
    }

    /// All segments ever opened on this channel, in open order, closed and
    /// open alike.
    pub fn segments(&self) -> Vec<Arc<Segment>> {
        self.lock().segments.clone()
    }

    /// Aggregate end time over this channel's segments: a monotonic ratchet
    /// that never decreases. A segment shrinking its own end through a
    /// removal rescan does not lower this value.
    pub fn end_ns(&self) -> Option<u64> {
        self.lock().end_ns
    }

    /// Whether the channel has been closed.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Closes the channel, force-closing its still-open segments first.
    /// Idempotent: repeat calls do nothing and re-raise no events.
    pub fn close(&self) {
        let open = {
            let mut inner = self.lock();
            if inner.closed {
                return;
            }
            inner.closed = true;
            inner.open_by_group.drain().map(|(_, s)| s).collect::<Vec<_>>()
        };
        for segment in open {
            if segment.mark_closed() {
                self.events.emit(&ModelEvent::SegmentClosed {
                    channel: self.name.clone(),
                    group: segment.group.clone(),
                    segment: segment.id,
                });
            }
        }
        tracing::debug!(channel = %self.name, "channel closed");
        self.events.emit(&ModelEvent::ChannelClosed {
            channel: self.name.clone(),
        });
    }

    /// Ratchets the channel aggregate upward, propagating to the sink and
    /// raising [`ModelEvent::BoundaryChanged`] when the value actually grew.
    fn observe_end_ns(&self, segment: SegmentId, end_ns: u64) {
        let raised = {
            let mut inner = self.lock();
            if inner.end_ns.is_none_or(|current| end_ns > current) {
                inner.end_ns = Some(end_ns);
                true
            } else {
                false
            }
        };
        if raised {
            if let Some(sink) = self.sink.upgrade() {
                sink.observe_end_ns(end_ns);
            }
            self.events.emit(&ModelEvent::BoundaryChanged {
                channel: self.name.clone(),
                segment,
                end_ns,
            });
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChannelInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A contiguous, independently closable run of data points for one
/// `(channel, group)` pair.
///
/// Extents only grow while appending; removal operations shrink them
/// through one shared full-rescan path, the only way they shrink.
/// Whenever the segment is non-empty, `start_ns <= end_ns` and
/// `min_value <= max_value`; an empty segment has `None` value/end extents
/// and keeps its opening start time.
#[derive(Debug)]
pub struct Segment {
    id: SegmentId,
    group: String,
    channel_name: String,
    channel: Weak<Channel>,
    inner: Mutex<SegmentInner>,
}

#[derive(Debug)]
struct SegmentInner {
    points: Vec<DataPoint>,
    start_ns: u64,
    end_ns: Option<u64>,
    min_value: Option<i64>,
    max_value: Option<i64>,
    editable: bool,
}

impl Segment {
    /// The segment's identity.
    pub fn id(&self) -> SegmentId {
        self.id
    }

    /// The group this segment belongs to.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Name of the owning channel.
    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    /// Appends one point, growing the extents outward.
    ///
    /// A single-point append may also move `start_ns` earlier; batch
    /// appends never do.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::SegmentClosed`] once the segment is no
    /// longer editable.
    pub fn add_point(&self, point: DataPoint) -> Result<()> {
        let end_ns = {
            let mut inner = self.lock();
            self.guard_editable(&inner)?;
            inner.points.push(point);
            inner.start_ns = inner.start_ns.min(point.captured_at_ns);
            let end_ns = inner
                .end_ns
                .map_or(point.captured_at_ns, |e| e.max(point.captured_at_ns));
            inner.end_ns = Some(end_ns);
            inner.min_value = Some(inner.min_value.map_or(point.value, |v| v.min(point.value)));
            inner.max_value = Some(inner.max_value.map_or(point.value, |v| v.max(point.value)));
            end_ns
        };
        self.propagate_end(end_ns);
        Ok(())
    }

    /// Appends a batch of points, growing the extents outward.
    ///
    /// `bounds` may carry the batch's pre-computed min/max value and end
    /// time to skip the O(k) derivation scan; when `None`, the segment
    /// derives them. An empty batch is accepted and changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::SegmentClosed`] once the segment is no
    /// longer editable.
    pub fn add_points(&self, points: &[DataPoint], bounds: Option<BatchBounds>) -> Result<()> {
        let end_ns = {
            let mut inner = self.lock();
            self.guard_editable(&inner)?;
            if points.is_empty() {
                return Ok(());
            }
            let bounds = bounds.unwrap_or_else(|| BatchBounds::derive(points));
            inner.points.extend_from_slice(points);
            let end_ns = inner.end_ns.map_or(bounds.end_ns, |e| e.max(bounds.end_ns));
            inner.end_ns = Some(end_ns);
            inner.min_value = Some(
                inner
                    .min_value
                    .map_or(bounds.min_value, |v| v.min(bounds.min_value)),
            );
            inner.max_value = Some(
                inner
                    .max_value
                    .map_or(bounds.max_value, |v| v.max(bounds.max_value)),
            );
            end_ns
        };
        self.propagate_end(end_ns);
        Ok(())
    }

    /// Removes every point with capture time before `t`, then rescans the
    /// extents. Allowed on closed segments (historical runs get trimmed).
    ///
    /// # Errors
    ///
    /// Returns [`crate::QueryError::Unsorted`] if the point list fails the
    /// cheap order check.
    pub fn remove_before(&self, t_ns: u64) -> Result<usize> {
        let mut inner = self.lock();
        let cut = first_at_or_after(&inner.points, t_ns)?;
        inner.points.drain(..cut);
        inner.recalculate();
        Ok(cut)
    }

    /// Removes every point with capture time after `t`, then rescans the
    /// extents. Allowed on closed segments.
    ///
    /// # Errors
    ///
    /// Returns [`crate::QueryError::Unsorted`] if the point list fails the
    /// cheap order check.
    pub fn remove_after(&self, t_ns: u64) -> Result<usize> {
        let mut inner = self.lock();
        let keep = last_at_or_before(&inner.points, t_ns)?.map_or(0, |i| i + 1);
        let removed = inner.points.len() - keep;
        inner.points.truncate(keep);
        inner.recalculate();
        Ok(removed)
    }

    /// Removes every point matching the predicate, then rescans the
    /// extents. Allowed on closed segments.
    pub fn remove_where(&self, mut predicate: impl FnMut(&DataPoint) -> bool) -> usize {
        let mut inner = self.lock();
        let before = inner.points.len();
        inner.points.retain(|point| !predicate(point));
        inner.recalculate();
        before - inner.points.len()
    }

    /// Removes all points. Value and end extents clear; the opening start
    /// time is kept.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.points.clear();
        inner.recalculate();
    }

    /// Whether the segment is still editable.
    pub fn is_editable(&self) -> bool {
        self.lock().editable
    }

    /// Number of points currently held.
    pub fn len(&self) -> usize {
        self.lock().points.len()
    }

    /// Whether the segment holds no points.
    pub fn is_empty(&self) -> bool {
        self.lock().points.is_empty()
    }

    /// Start time: the opening start, moved earlier by single-point appends
    /// and rescans.
    pub fn start_ns(&self) -> u64 {
        self.lock().start_ns
    }

    /// End time of the run, or `None` while empty.
    pub fn end_ns(&self) -> Option<u64> {
        self.lock().end_ns
    }

    /// Smallest value in the run, or `None` while empty.
    pub fn min_value(&self) -> Option<i64> {
        self.lock().min_value
    }

    /// Largest value in the run, or `None` while empty.
    pub fn max_value(&self) -> Option<i64> {
        self.lock().max_value
    }

    /// Copies out the run's points, in order.
    pub fn points(&self) -> Vec<DataPoint> {
        self.lock().points.clone()
    }

    /// Transitions to closed. Returns `true` on the first call only.
    pub(crate) fn mark_closed(&self) -> bool {
        let mut inner = self.lock();
        if inner.editable {
            inner.editable = false;
            true
        } else {
            false
        }
    }

    fn guard_editable(&self, inner: &SegmentInner) -> Result<()> {
        if inner.editable {
            Ok(())
        } else {
            Err(LifecycleError::SegmentClosed {
                segment: self.id,
                channel: self.channel_name.clone(),
            }
            .into())
        }
    }

    fn propagate_end(&self, end_ns: u64) {
        if let Some(channel) = self.channel.upgrade() {
            channel.observe_end_ns(self.id, end_ns);
        }
    }

    fn lock(&self) -> MutexGuard<'_, SegmentInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SegmentInner {
    /// Full O(k) rescan of the extents; the only path by which they shrink.
    ///
    /// Incremental tracking cannot cheaply tell whether a removed point was
    /// non-extremal, so every removal pays the rescan.
    fn recalculate(&mut self) {
        let Some(first) = self.points.first() else {
            self.end_ns = None;
            self.min_value = None;
            self.max_value = None;
            return;
        };
        let mut start_ns = first.captured_at_ns;
        let mut end_ns = first.captured_at_ns;
        let mut min_value = first.value;
        let mut max_value = first.value;
        for point in &self.points[1..] {
            start_ns = start_ns.min(point.captured_at_ns);
            end_ns = end_ns.max(point.captured_at_ns);
            min_value = min_value.min(point.value);
            max_value = max_value.max(point.value);
        }
        self.start_ns = start_ns;
        self.end_ns = Some(end_ns);
        self.min_value = Some(min_value);
        self.max_value = Some(max_value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PulseError;
    use std::sync::Mutex as StdMutex;

    fn p(t: u64, v: i64) -> DataPoint {
        DataPoint::new(t, v)
    }

    #[test]
    fn test_channel_get_or_create() {
        let sink = Sink::new("proc-1");
        let a = sink.create_channel("memory").unwrap();
        let b = sink.create_channel("memory").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(sink.channels().len(), 1);

        sink.create_channel("gc").unwrap();
        assert_eq!(sink.channels().len(), 2);
        assert!(sink.channel("gc").is_some());
        assert!(sink.channel("missing").is_none());
    }

    #[test]
    fn test_single_editable_segment_per_group() {
        let sink = Sink::new("proc-1");
        let channel = sink.create_channel("memory").unwrap();

        let first = channel.open_segment("heap", 100).unwrap();
        assert!(first.is_editable());

        let second = channel.open_segment("heap", 200).unwrap();
        assert!(!first.is_editable(), "displaced segment is closed first");
        assert!(second.is_editable());

        let current = channel.current_segment("heap").unwrap().unwrap();
        assert_eq!(current.id(), second.id());

        // A different group gets its own open segment.
        let other = channel.open_segment("stack", 150).unwrap();
        assert!(other.is_editable());
        assert!(second.is_editable());
    }

    #[test]
    fn test_add_point_grows_extents_only() {
        let sink = Sink::new("proc-1");
        let channel = sink.create_channel("memory").unwrap();
        let segment = channel.open_segment("heap", 100).unwrap();

        assert_eq!(segment.end_ns(), None);
        assert_eq!(segment.min_value(), None);

        segment.add_point(p(120, 5)).unwrap();
        segment.add_point(p(140, -2)).unwrap();
        segment.add_point(p(160, 9)).unwrap();

        assert_eq!(segment.start_ns(), 100);
        assert_eq!(segment.end_ns(), Some(160));
        assert_eq!(segment.min_value(), Some(-2));
        assert_eq!(segment.max_value(), Some(9));

        // A single point earlier than the opening start moves it.
        segment.add_point(p(161, 0)).unwrap();
        let early_sink = Sink::new("p2");
        let ch = early_sink.create_channel("c").unwrap();
        let seg = ch.open_segment("g", 500).unwrap();
        seg.add_point(p(400, 1)).unwrap();
        assert_eq!(seg.start_ns(), 400);
    }

    #[test]
    fn test_add_points_batch_bounds() {
        let sink = Sink::new("proc-1");
        let channel = sink.create_channel("memory").unwrap();
        let segment = channel.open_segment("heap", 0).unwrap();

        // Derived bounds.
        segment
            .add_points(&[p(10, 3), p(20, 7), p(30, 1)], None)
            .unwrap();
        assert_eq!(segment.end_ns(), Some(30));
        assert_eq!(segment.min_value(), Some(1));
        assert_eq!(segment.max_value(), Some(7));

        // Caller-supplied bounds are trusted and merged outward.
        segment
            .add_points(
                &[p(40, 4)],
                Some(BatchBounds {
                    min_value: 4,
                    max_value: 4,
                    end_ns: 40,
                }),
            )
            .unwrap();
        assert_eq!(segment.end_ns(), Some(40));
        assert_eq!(segment.min_value(), Some(1));

        // Empty batch is a no-op.
        segment.add_points(&[], None).unwrap();
        assert_eq!(segment.len(), 4);
    }

    #[test]
    fn test_add_rejected_after_close() {
        let sink = Sink::new("proc-1");
        let channel = sink.create_channel("memory").unwrap();
        let segment = channel.open_segment("heap", 0).unwrap();
        channel.close_segment(&segment).unwrap();

        let err = segment.add_point(p(10, 1)).unwrap_err();
        assert!(matches!(
            err,
            PulseError::Lifecycle(LifecycleError::SegmentClosed { .. })
        ));
        assert!(segment.add_points(&[p(10, 1)], None).is_err());
        assert!(channel.current_segment("heap").unwrap().is_none());
    }

    #[test]
    fn test_removals_shrink_via_rescan() {
        let sink = Sink::new("proc-1");
        let channel = sink.create_channel("memory").unwrap();
        let segment = channel.open_segment("heap", 0).unwrap();
        segment
            .add_points(&[p(10, 5), p(20, 9), p(30, 1), p(40, 7)], None)
            .unwrap();

        assert_eq!(segment.remove_before(20).unwrap(), 1);
        assert_eq!(segment.start_ns(), 20);
        assert_eq!(segment.min_value(), Some(1));

        assert_eq!(segment.remove_after(30).unwrap(), 1);
        assert_eq!(segment.end_ns(), Some(30));
        assert_eq!(segment.max_value(), Some(9));

        assert_eq!(segment.remove_where(|point| point.value == 9), 1);
        assert_eq!(segment.max_value(), Some(1));

        segment.clear();
        assert!(segment.is_empty());
        assert_eq!(segment.end_ns(), None);
        assert_eq!(segment.min_value(), None);
        // The opening start survives an emptying clear.
        assert_eq!(segment.start_ns(), 20);
    }

    #[test]
    fn test_removal_allowed_on_closed_segment() {
        let sink = Sink::new("proc-1");
        let channel = sink.create_channel("memory").unwrap();
        let segment = channel.open_segment("heap", 0).unwrap();
        segment.add_points(&[p(10, 1), p(20, 2)], None).unwrap();
        channel.close_segment(&segment).unwrap();

        // Historical runs still get trimmed.
        assert_eq!(segment.remove_before(15).unwrap(), 1);
        assert_eq!(segment.len(), 1);
    }

    #[test]
    fn test_end_ratchet_survives_shrink() {
        let sink = Sink::new("proc-1");
        let channel = sink.create_channel("memory").unwrap();
        let segment = channel.open_segment("heap", 0).unwrap();

        segment.add_point(p(100, 1)).unwrap();
        segment.add_point(p(200, 2)).unwrap();
        assert_eq!(channel.end_ns(), Some(200));
        assert_eq!(sink.end_ns(), Some(200));

        // Shrinking the segment's own end does not lower the aggregates.
        segment.remove_after(150).unwrap();
        assert_eq!(segment.end_ns(), Some(100));
        assert_eq!(channel.end_ns(), Some(200));
        assert_eq!(sink.end_ns(), Some(200));

        // The ratchet only moves for genuinely larger ends.
        segment.add_point(p(180, 3)).unwrap();
        assert_eq!(channel.end_ns(), Some(200));
        segment.add_point(p(250, 4)).unwrap();
        assert_eq!(channel.end_ns(), Some(250));
    }

    #[test]
    fn test_close_cascades() {
        let sink = Sink::new("proc-1");
        let channel = sink.create_channel("memory").unwrap();
        let segment = channel.open_segment("heap", 0).unwrap();

        sink.close();

        assert!(sink.is_closed());
        assert!(channel.is_closed());
        assert!(!segment.is_editable());

        assert!(matches!(
            sink.create_channel("x").unwrap_err(),
            PulseError::Lifecycle(LifecycleError::SinkClosed { .. })
        ));
        assert!(matches!(
            channel.open_segment("heap", 0).unwrap_err(),
            PulseError::Lifecycle(LifecycleError::ChannelClosed { .. })
        ));
        assert!(channel.current_segment("heap").is_err());

        // Idempotent: a second close changes nothing.
        sink.close();
        assert!(sink.is_closed());
    }

    #[test]
    fn test_model_events_sequence() {
        let sink = Sink::new("proc-1");
        let log: Arc<StdMutex<Vec<ModelEvent>>> = Arc::new(StdMutex::new(Vec::new()));
        let log_inner = Arc::clone(&log);
        sink.subscribe(move |event| log_inner.lock().unwrap().push(event.clone()));

        let channel = sink.create_channel("memory").unwrap();
        let first = channel.open_segment("heap", 0).unwrap();
        first.add_point(p(10, 1)).unwrap();
        let second = channel.open_segment("heap", 20).unwrap();
        let _ = second;
        sink.close();

        let log = log.lock().unwrap();
        assert_eq!(
            log[0],
            ModelEvent::ChannelCreated {
                sink: "proc-1".to_string(),
                channel: "memory".to_string(),
            }
        );
        assert_eq!(
            log[1],
            ModelEvent::SegmentOpened {
                channel: "memory".to_string(),
                group: "heap".to_string(),
                segment: first.id(),
            }
        );
        assert_eq!(
            log[2],
            ModelEvent::BoundaryChanged {
                channel: "memory".to_string(),
                segment: first.id(),
                end_ns: 10,
            }
        );
        // Reopening the group closes the displaced run before opening.
        assert!(matches!(log[3], ModelEvent::SegmentClosed { .. }));
        assert!(matches!(log[4], ModelEvent::SegmentOpened { .. }));
        // Cascade: the open segment closes, then the channel, then the sink.
        assert!(matches!(log[5], ModelEvent::SegmentClosed { .. }));
        assert!(matches!(log[6], ModelEvent::ChannelClosed { .. }));
        assert!(matches!(log[7], ModelEvent::SinkClosed { .. }));
        assert_eq!(log.len(), 8);
    }

    #[test]
    fn test_segment_snapshot_outlives_tree() {
        let sink = Sink::new("proc-1");
        let channel = sink.create_channel("memory").unwrap();
        let segment = channel.open_segment("heap", 0).unwrap();
        segment.add_points(&[p(10, 1), p(20, 2)], None).unwrap();

        let points = segment.points();
        sink.close();
        drop(sink);
        drop(channel);

        // The copied snapshot and the segment handle both stay usable.
        assert_eq!(points.len(), 2);
        assert_eq!(segment.len(), 2);
        assert!(!segment.is_editable());
    }
}
