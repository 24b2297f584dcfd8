//! Core data model for the pulse telemetry store.
//!
//! Defines the immutable sample types ingested by the stores, the channel
//! configuration declared at store construction, and the small derived types
//! shared across modules (extents, retention window).
//!
//! # Conventions
//!
//! - Capture times are `u64` nanoseconds since the Unix epoch (UTC) and are
//!   named with a `_ns` suffix.
//! - Metric values are `i64`. The sampled quantities are byte and object
//!   counts; a totally ordered integer keeps extent tracking exact.
//! - Samples are never mutated after creation. Stores hand out copies or
//!   call-scoped views, never live references to internal storage.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Identifier of a channel: a small integer id declared at store construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u32);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Configuration of one channel: a named, colored partition of samples.
///
/// Channels are declared when a store is constructed and are immutable
/// thereafter. The bounded and windowed stores do not create channels on
/// first use; only the segmented model creates channels on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// The channel id samples are tagged with.
    pub id: ChannelId,
    /// Human-readable channel name (e.g. "memory", "gc").
    pub name: String,
    /// Display color, as a CSS-style hex string (e.g. "#4078c0").
    pub color: String,
}

impl ChannelConfig {
    /// Creates a new channel configuration.
    pub fn new(id: u32, name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: ChannelId(id),
            name: name.into(),
            color: color.into(),
        }
    }
}

/// Anything carrying a capture time.
///
/// This is the seam the bound searches operate over: they only need the
/// capture time of each element, sorted ascending.
pub trait Timestamped {
    /// Capture time in nanoseconds since the Unix epoch.
    fn captured_at_ns(&self) -> u64;
}

/// A sample routable by channel: the seam the windowed store stores behind.
pub trait Sample: Timestamped + Clone {
    /// The channel this sample is tagged with.
    fn channel(&self) -> ChannelId;
}

/// A numeric telemetry sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricSample {
    /// Capture time in nanoseconds since the Unix epoch.
    pub captured_at_ns: u64,
    /// The channel this sample is tagged with.
    pub channel: ChannelId,
    /// The sampled value.
    pub value: i64,
}

impl MetricSample {
    /// Creates a new metric sample.
    pub fn new(captured_at_ns: u64, channel: ChannelId, value: i64) -> Self {
        Self {
            captured_at_ns,
            channel,
            value,
        }
    }
}

impl Timestamped for MetricSample {
    fn captured_at_ns(&self) -> u64 {
        self.captured_at_ns
    }
}

impl Sample for MetricSample {
    fn channel(&self) -> ChannelId {
        self.channel
    }
}

/// A labeled event sample (e.g. a GC run, an allocation spike marker).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSample {
    /// Capture time in nanoseconds since the Unix epoch.
    pub captured_at_ns: u64,
    /// The channel this sample is tagged with.
    pub channel: ChannelId,
    /// Short human-readable label shown by the consumer.
    pub label: String,
    /// Icon identifier for the consumer's presentation layer.
    pub icon: String,
    /// Optional correlation id linking the event to an external record.
    /// Diagnostic-only; not part of the snapshot export.
    pub external_id: Option<String>,
}

impl EventSample {
    /// Creates a new event sample without an external correlation id.
    pub fn new(
        captured_at_ns: u64,
        channel: ChannelId,
        label: impl Into<String>,
        icon: impl Into<String>,
    ) -> Self {
        Self {
            captured_at_ns,
            channel,
            label: label.into(),
            icon: icon.into(),
            external_id: None,
        }
    }

    /// Attaches an external correlation id.
    #[must_use]
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }
}

impl Timestamped for EventSample {
    fn captured_at_ns(&self) -> u64 {
        self.captured_at_ns
    }
}

impl Sample for EventSample {
    fn channel(&self) -> ChannelId {
        self.channel
    }
}

/// Derived value/time extents of a live sample set.
///
/// Extents are never authoritative: they are always recomputable by scanning
/// the current contents, maintained incrementally on insert, and rebuilt by a
/// full rescan when a removed element may have been an extreme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extents {
    /// Smallest sampled value currently held.
    pub min_value: i64,
    /// Largest sampled value currently held.
    pub max_value: i64,
    /// Earliest capture time currently held, in nanoseconds.
    pub min_ns: u64,
    /// Latest capture time currently held, in nanoseconds.
    pub max_ns: u64,
}

impl Extents {
    /// Extents of a single sample.
    pub fn of(sample: &MetricSample) -> Self {
        Self {
            min_value: sample.value,
            max_value: sample.value,
            min_ns: sample.captured_at_ns,
            max_ns: sample.captured_at_ns,
        }
    }

    /// Merges one sample into the extents, enlarging them as needed.
    pub fn merge(&mut self, sample: &MetricSample) {
        self.min_value = self.min_value.min(sample.value);
        self.max_value = self.max_value.max(sample.value);
        self.min_ns = self.min_ns.min(sample.captured_at_ns);
        self.max_ns = self.max_ns.max(sample.captured_at_ns);
    }

    /// Computes extents by scanning a sample sequence.
    ///
    /// Returns `None` for an empty sequence.
    pub fn scan<'a, I>(samples: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a MetricSample>,
    {
        let mut iter = samples.into_iter();
        let mut extents = Self::of(iter.next()?);
        for sample in iter {
            extents.merge(sample);
        }
        Some(extents)
    }

    /// Whether the given sample sits on any of the four extremes.
    pub fn is_extremal(&self, sample: &MetricSample) -> bool {
        sample.value == self.min_value
            || sample.value == self.max_value
            || sample.captured_at_ns == self.min_ns
            || sample.captured_at_ns == self.max_ns
    }
}

/// A sliding retention window.
///
/// Samples with `captured_at_ns < now - duration` are eligible for eviction
/// on the next mutation of the owning store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionWindow {
    duration: Duration,
}

impl RetentionWindow {
    /// Creates a retention window from a duration.
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// Creates a retention window of `secs` seconds.
    pub fn from_secs(secs: u64) -> Self {
        Self {
            duration: Duration::from_secs(secs),
        }
    }

    /// The window duration.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// The sliding cutoff for the given current time: `now - duration`,
    /// saturating at zero.
    #[allow(clippy::cast_possible_truncation)] // duration fits u64 ns for any sane window
    pub fn cutoff_ns(&self, now_ns: u64) -> u64 {
        now_ns.saturating_sub(self.duration.as_nanos() as u64)
    }
}
