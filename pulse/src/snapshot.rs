//! Snapshot export of the windowed stores.
//!
//! A [`Snapshot`] is a serializable tree of everything two windowed stores
//! (one metric, one event) currently hold: the channel table plus one point
//! series per channel. It exists for external save/copy actions — the
//! format is human-readable JSON with no binary framing — and is a copy:
//! capturing does not retain any reference into the live stores.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SnapshotError};
use crate::sample::{ChannelConfig, ChannelId, EventSample, MetricSample};
use crate::window::WindowStore;

/// Serializable tree of a store pair's current contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The channel table: union of both stores' channels.
    pub channels: Vec<ChannelConfig>,
    /// One metric series per metric-store channel, in declaration order.
    pub metrics: Vec<MetricSeries>,
    /// One event series per event-store channel, in declaration order.
    pub events: Vec<EventSeries>,
}

/// The metric points of one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSeries {
    /// The channel the points belong to.
    pub channel: ChannelId,
    /// The points, in chronological order.
    pub points: Vec<MetricPoint>,
}

/// One exported metric point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricPoint {
    /// Capture time in nanoseconds since the Unix epoch.
    pub captured_at_ns: u64,
    /// The sampled value.
    pub value: i64,
}

/// The event points of one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSeries {
    /// The channel the points belong to.
    pub channel: ChannelId,
    /// The points, in chronological order.
    pub points: Vec<EventPoint>,
}

/// One exported event point. External correlation ids are diagnostic-only
/// and deliberately not exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPoint {
    /// Capture time in nanoseconds since the Unix epoch.
    pub captured_at_ns: u64,
    /// The event's label.
    pub label: String,
    /// The event's icon identifier.
    pub icon: String,
}

impl Snapshot {
    /// Captures the current contents of a metric store and an event store.
    ///
    /// Each store is snapshotted channel by channel under its own lock;
    /// the result is consistent per channel, not across the pair.
    ///
    /// # Errors
    ///
    /// Returns [`crate::QueryError::Unsorted`] if a channel list fails the
    /// cheap order check (a producer violated the append-order assumption).
    pub fn capture(
        metrics: &WindowStore<MetricSample>,
        events: &WindowStore<EventSample>,
    ) -> Result<Self> {
        let mut channels = metrics.channels().to_vec();
        for config in events.channels() {
            if !channels.iter().any(|existing| existing.id == config.id) {
                channels.push(config.clone());
            }
        }

        let mut metric_series = Vec::with_capacity(metrics.channels().len());
        for config in metrics.channels() {
            let samples = metrics.query_range(config.id, 0, u64::MAX)?;
            metric_series.push(MetricSeries {
                channel: config.id,
                points: samples
                    .iter()
                    .map(|sample| MetricPoint {
                        captured_at_ns: sample.captured_at_ns,
                        value: sample.value,
                    })
                    .collect(),
            });
        }

        let mut event_series = Vec::with_capacity(events.channels().len());
        for config in events.channels() {
            let samples = events.query_range(config.id, 0, u64::MAX)?;
            event_series.push(EventSeries {
                channel: config.id,
                points: samples
                    .into_iter()
                    .map(|sample| EventPoint {
                        captured_at_ns: sample.captured_at_ns,
                        label: sample.label,
                        icon: sample.icon,
                    })
                    .collect(),
            });
        }

        Ok(Self {
            channels,
            metrics: metric_series,
            events: event_series,
        })
    }

    /// Serializes the snapshot to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Serialize`] if serialization fails.
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|source| SnapshotError::Serialize { source }.into())
    }

    /// Writes the snapshot to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Serialize`] or [`SnapshotError::Write`] on
    /// failure.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let data = self.to_json_string()?;
        fs::write(path, data).map_err(|source| SnapshotError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// Reads a snapshot back from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Read`] or [`SnapshotError::Parse`] on
    /// failure.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| SnapshotError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| {
            SnapshotError::Parse {
                path: path.to_path_buf(),
                source,
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::RetentionWindow;

    fn stores() -> (WindowStore<MetricSample>, WindowStore<EventSample>) {
        let metrics = WindowStore::new(
            RetentionWindow::from_secs(60),
            vec![
                ChannelConfig::new(0, "memory", "#4078c0"),
                ChannelConfig::new(1, "handles", "#2aa043"),
            ],
        )
        .unwrap();
        let events = WindowStore::new(
            RetentionWindow::from_secs(60),
            vec![ChannelConfig::new(10, "gc", "#b3003d")],
        )
        .unwrap();
        (metrics, events)
    }

    #[test]
    fn test_capture_tree_shape() {
        let (metrics, events) = stores();
        metrics
            .append(MetricSample::new(10, ChannelId(0), 100))
            .unwrap();
        metrics
            .append(MetricSample::new(20, ChannelId(0), 200))
            .unwrap();
        events
            .append(EventSample::new(15, ChannelId(10), "Gen2 GC", "gc").with_external_id("x"))
            .unwrap();

        let snapshot = Snapshot::capture(&metrics, &events).unwrap();

        assert_eq!(snapshot.channels.len(), 3);
        assert_eq!(snapshot.metrics.len(), 2);
        assert_eq!(snapshot.metrics[0].points.len(), 2);
        assert_eq!(snapshot.metrics[1].points.len(), 0);
        assert_eq!(snapshot.events[0].points.len(), 1);
        assert_eq!(snapshot.events[0].points[0].label, "Gen2 GC");
    }

    #[test]
    fn test_json_field_naming() {
        let (metrics, events) = stores();
        metrics
            .append(MetricSample::new(10, ChannelId(0), 100))
            .unwrap();

        let snapshot = Snapshot::capture(&metrics, &events).unwrap();
        let json = snapshot.to_json_string().unwrap();

        // Interchange keys are camelCase; external ids never leave the
        // process.
        assert!(json.contains("\"capturedAtNs\""));
        assert!(json.contains("\"channels\""));
        assert!(!json.contains("externalId"));
        assert!(!json.contains("external_id"));
    }

    #[test]
    fn test_json_round_trip() {
        let (metrics, events) = stores();
        metrics
            .append(MetricSample::new(10, ChannelId(0), -5))
            .unwrap();
        events
            .append(EventSample::new(15, ChannelId(10), "spike", "warn"))
            .unwrap();

        let snapshot = Snapshot::capture(&metrics, &events).unwrap();
        let json = snapshot.to_json_string().unwrap();
        let parsed: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, snapshot);
    }
}
