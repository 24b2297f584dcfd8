//! Demo embedding of the pulse telemetry store.
//!
//! Runs a synthetic sampler thread appending metric and event samples into
//! shared stores while a consumer thread trims against the retention window
//! and queries the most recent span — the producer/consumer shape the store
//! is built for. Finishes by printing a JSON snapshot to stdout.

mod sampler;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use pulse::{
    ChannelConfig, ChannelId, EventSample, MetricSample, RetentionWindow, SampleRing, Snapshot,
    StoreDiff, WindowStore,
};

/// pulse-demo — synthetic sampler over an embedded pulse store.
#[derive(Parser)]
#[command(name = "pulse-demo", version, about)]
struct Cli {
    /// Samples per second produced per channel.
    #[arg(long, default_value = "50")]
    rate_hz: u32,

    /// How long to run, in seconds.
    #[arg(long, default_value = "5")]
    duration_secs: u64,

    /// Sliding retention window, in seconds.
    #[arg(long, default_value = "2")]
    retention_secs: u64,

    /// Capacity of the fixed-size ring mirror of the memory channel.
    #[arg(long, default_value = "256")]
    ring_capacity: usize,

    /// Skip printing the final JSON snapshot.
    #[arg(long)]
    no_snapshot: bool,
}

/// Channel ids used by the demo.
const CH_MEMORY: ChannelId = ChannelId(0);
const CH_HANDLES: ChannelId = ChannelId(1);
const CH_GC: ChannelId = ChannelId(10);

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        tracing::error!("demo failed: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> pulse::Result<()> {
    let metrics = Arc::new(WindowStore::new(
        RetentionWindow::from_secs(cli.retention_secs),
        vec![
            ChannelConfig::new(CH_MEMORY.0, "memory", "#4078c0"),
            ChannelConfig::new(CH_HANDLES.0, "handles", "#2aa043"),
        ],
    )?);
    let events = Arc::new(WindowStore::new(
        RetentionWindow::from_secs(cli.retention_secs),
        vec![ChannelConfig::new(CH_GC.0, "gc", "#b3003d")],
    )?);
    let ring = Arc::new(SampleRing::new(cli.ring_capacity));

    metrics.subscribe(|diff: &StoreDiff<MetricSample>| {
        if !diff.removed.is_empty() {
            tracing::debug!(evicted = diff.removed.len(), "metric samples left the window");
        }
    });

    let producer = {
        let metrics = Arc::clone(&metrics);
        let events = Arc::clone(&events);
        let ring = Arc::clone(&ring);
        let config = sampler::SamplerConfig {
            rate_hz: cli.rate_hz,
            duration: Duration::from_secs(cli.duration_secs),
        };
        thread::spawn(move || sampler::run(&config, &metrics, &events, &ring))
    };

    let consumer = {
        let metrics = Arc::clone(&metrics);
        let events = Arc::clone(&events);
        let ring = Arc::clone(&ring);
        let duration = Duration::from_secs(cli.duration_secs);
        thread::spawn(move || consume(duration, &metrics, &events, &ring))
    };

    producer.join().expect("sampler thread panicked")?;
    consumer.join().expect("consumer thread panicked")?;

    if !cli.no_snapshot {
        let snapshot = Snapshot::capture(&metrics, &events)?;
        println!("{}", snapshot.to_json_string()?);
    }
    Ok(())
}

/// UI-refresh-style consumer: trims to the retention window, then renders
/// the latest second of data as log lines.
fn consume(
    duration: Duration,
    metrics: &WindowStore<MetricSample>,
    events: &WindowStore<EventSample>,
    ring: &SampleRing,
) -> pulse::Result<()> {
    let deadline = std::time::Instant::now() + duration;
    while std::time::Instant::now() < deadline {
        thread::sleep(Duration::from_millis(250));
        let now_ns = sampler::now_ns();

        metrics.trim_to(now_ns);
        events.trim_to(now_ns);

        let window_start = now_ns.saturating_sub(1_000_000_000);
        let (count, last) = metrics.use_range(CH_MEMORY, window_start, now_ns, |view| {
            (view.len(), view.last().map(|s| s.value))
        })?;
        let gc_count = events.len(CH_GC)?;
        let ring_extents = ring.extents();

        tracing::info!(
            recent = count,
            last_memory = last.unwrap_or(0),
            gc_events = gc_count,
            ring_min = ring_extents.map_or(0, |e| e.min_value),
            ring_max = ring_extents.map_or(0, |e| e.max_value),
            "window refresh"
        );
    }
    Ok(())
}
