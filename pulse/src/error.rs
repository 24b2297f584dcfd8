//! Error types for the pulse telemetry store.

use std::path::PathBuf;

use thiserror::Error;

use crate::sample::ChannelId;
use crate::segment::SegmentId;

/// The main error type for all pulse operations.
///
/// This enum covers all error conditions that can occur across the store
/// surfaces, from construction through appends, queries, and snapshot export.
/// Every error is surfaced synchronously to the immediate caller; the library
/// has no background error channel, retry, or backoff.
#[derive(Error, Debug)]
pub enum PulseError {
    /// Error on the ring store append path.
    #[error("ring error: {0}")]
    Ring(#[from] RingError),

    /// Error during a range query or search.
    #[error("query error: {0}")]
    Query(#[from] QueryError),

    /// Error in channel configuration or routing.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Mutation attempted on a closed sink, channel, or segment.
    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// Error during snapshot export or import.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// Errors that can occur on the ring store write path.
#[derive(Error, Debug)]
pub enum RingError {
    /// A sample was pushed with a capture time at or before the last
    /// accepted one. Ring insertion order must be strictly increasing;
    /// the buffer is unchanged when this is returned.
    #[error("out-of-order push: capture time {attempted_ns} is not after last accepted {last_ns}")]
    OutOfOrder {
        /// Capture time of the last accepted sample, in nanoseconds.
        last_ns: u64,
        /// Capture time of the rejected sample, in nanoseconds.
        attempted_ns: u64,
    },
}

/// Errors that can occur during query and search operations.
#[derive(Error, Debug)]
pub enum QueryError {
    /// The time range is invalid (`min_ns > max_ns`).
    ///
    /// Only the ring store rejects inverted ranges; the windowed store
    /// coerces them instead. The asymmetry is deliberate.
    #[error("invalid time range: min {min_ns} > max {max_ns}")]
    InvalidTimeRange {
        /// The requested lower bound.
        min_ns: u64,
        /// The requested upper bound.
        max_ns: u64,
    },

    /// The input sequence failed the cheap sortedness check.
    ///
    /// The bound searches require input sorted ascending by capture time.
    /// Only a first-versus-last comparison is performed; deeper disorder
    /// is not guaranteed to be caught and yields unspecified results.
    #[error("sequence is not sorted ascending by capture time")]
    Unsorted,
}

/// Errors in channel configuration or sample routing.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// A sample or query referenced a channel the store was not
    /// constructed with. Channels are fixed at construction.
    #[error("unknown channel {channel}")]
    UnknownChannel {
        /// The unrecognized channel id.
        channel: ChannelId,
    },

    /// Two channel configurations share the same id.
    #[error("duplicate channel id {channel}")]
    DuplicateChannel {
        /// The conflicting channel id.
        channel: ChannelId,
    },

    /// A channel configuration has an empty name.
    #[error("channel {channel} has an empty name")]
    EmptyChannelName {
        /// The offending channel id.
        channel: ChannelId,
    },
}

/// Mutation attempted after an entity transitioned to closed.
///
/// Sink, channel, and segment close exactly once and cannot reopen. The
/// entity's identity is carried for diagnostics; the error is raised at the
/// point of the illegal call and never silently ignored.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// The segment is no longer editable.
    #[error("segment {segment} in channel '{channel}' is closed for editing")]
    SegmentClosed {
        /// The closed segment's id.
        segment: SegmentId,
        /// Name of the owning channel.
        channel: String,
    },

    /// The channel is closed.
    #[error("channel '{channel}' is closed for editing")]
    ChannelClosed {
        /// The closed channel's name.
        channel: String,
    },

    /// The sink is closed.
    #[error("sink '{sink}' is closed for editing")]
    SinkClosed {
        /// The closed sink's name.
        sink: String,
    },
}

/// Errors that can occur during snapshot export or import.
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// Failed to read a snapshot file.
    #[error("failed to read snapshot '{}': {source}", path.display())]
    Read {
        /// The snapshot file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a snapshot file.
    #[error("failed to write snapshot '{}': {source}", path.display())]
    Write {
        /// The snapshot file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse a snapshot from JSON.
    #[error("failed to parse snapshot '{}': {source}", path.display())]
    Parse {
        /// The snapshot file path.
        path: PathBuf,
        /// The underlying JSON parsing error.
        #[source]
        source: serde_json::Error,
    },

    /// Failed to serialize a snapshot to JSON.
    #[error("failed to serialize snapshot: {source}")]
    Serialize {
        /// The underlying JSON serialization error.
        #[source]
        source: serde_json::Error,
    },
}

/// Type alias for `Result<T, PulseError>`.
pub type Result<T> = std::result::Result<T, PulseError>;
