//! # pulse
//!
//! In-process telemetry sampling store for live diagnostics.
//!
//! pulse is a Rust library for ingesting numeric metric samples and labeled
//! event samples tagged by channel, retaining them under a bounded policy
//! (fixed capacity or sliding time window), and answering time-range queries
//! while producers keep appending concurrently with consumers querying.
//! It targets single-process, moderate-throughput telemetry feeding an
//! attached diagnostic UI — it is not a general time-series database.
//!
//! ## Key Properties
//!
//! - Strict chronological insertion with live incremental min/max tracking
//!   in the fixed-capacity ring store
//! - Sliding-window retention with combined added/removed change diffs in
//!   the per-channel windowed store
//! - O(log n) range location shared by every query path
//! - A sink → channel → segment hierarchy partitioning a channel's data into
//!   discrete, independently closable runs
//! - Synchronous, lock-based concurrency: no async, no background threads,
//!   notifications fire after the mutating lock is released
//!
//! ## Quick Start
//!
//! ```rust
//! use pulse::{ChannelConfig, ChannelId, MetricSample, RetentionWindow, WindowStore};
//!
//! # fn main() -> pulse::Result<()> {
//! // One store, two channels, 10 minutes of retention.
//! let store = WindowStore::new(
//!     RetentionWindow::from_secs(600),
//!     vec![
//!         ChannelConfig::new(0, "memory", "#4078c0"),
//!         ChannelConfig::new(1, "gc", "#b3003d"),
//!     ],
//! )?;
//!
//! // Producers append; consumers query ranges.
//! store.append(MetricSample::new(1_000_000_000, ChannelId(0), 84_213_760))?;
//! store.append(MetricSample::new(2_000_000_000, ChannelId(0), 85_110_784))?;
//!
//! let recent = store.query_range(ChannelId(0), 0, u64::MAX)?;
//! assert_eq!(recent.len(), 2);
//!
//! // Trimming evicts everything older than the cutoff and raises one
//! // combined removal diff.
//! store.trim_expired(1_500_000_000);
//! assert_eq!(store.len(ChannelId(0))?, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`ring`] — fixed-capacity circular buffer with extent tracking
//! - [`window`] — per-channel store with sliding-window retention
//! - [`segment`] — sink → channel → segment lifecycle model
//! - [`search`] — bound searches over time-sorted sequences
//! - [`notify`] — change notification fabric
//! - [`snapshot`] — JSON snapshot export
//! - [`sample`] — sample types, channels, extents, retention window
//! - [`error`] — error types

pub mod error;
pub mod notify;
pub mod ring;
pub mod sample;
pub mod search;
pub mod segment;
pub mod snapshot;
pub mod window;

// Re-export primary API types at crate root for convenience.
pub use error::{ChannelError, LifecycleError, PulseError, QueryError, Result, RingError, SnapshotError};
pub use notify::{ModelEvent, StoreDiff, SubscriberSet, SubscriptionId};
pub use ring::SampleRing;
pub use sample::{
    ChannelConfig, ChannelId, EventSample, Extents, MetricSample, RetentionWindow, Sample,
    Timestamped,
};
pub use segment::{BatchBounds, Channel, DataPoint, Segment, SegmentId, Sink};
pub use snapshot::Snapshot;
pub use window::WindowStore;
