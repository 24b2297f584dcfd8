//! Synthetic telemetry producer.
//!
//! Generates a plausible-looking memory curve (slow ramp with sawtooth
//! drops), a jittery handle count, and occasional GC marker events, feeding
//! them into the shared stores at a fixed rate.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use pulse::{EventSample, MetricSample, SampleRing, WindowStore};

use crate::{CH_GC, CH_HANDLES, CH_MEMORY};

/// Sampler settings taken from the command line.
pub struct SamplerConfig {
    /// Samples per second per channel.
    pub rate_hz: u32,
    /// Total run time.
    pub duration: Duration,
}

/// Current wall-clock time in nanoseconds since the Unix epoch.
#[allow(clippy::cast_possible_truncation)] // fits u64 until the year 2554
pub fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos() as u64)
}

/// Runs the sampling loop until the configured duration elapses.
pub fn run(
    config: &SamplerConfig,
    metrics: &WindowStore<MetricSample>,
    events: &WindowStore<EventSample>,
    ring: &SampleRing,
) -> pulse::Result<()> {
    let period = Duration::from_secs(1) / config.rate_hz.max(1);
    let deadline = Instant::now() + config.duration;

    let mut memory: i64 = 64 << 20;
    let mut handles: i64 = 120;
    let mut state: u64 = 0x853c_49e6_748f_ea9b;
    let mut tick: u64 = 0;

    while Instant::now() < deadline {
        let now = now_ns();
        tick += 1;

        // xorshift64 jitter source
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;

        memory += 48 * 1024 + (state % 8192) as i64;
        handles += (state % 5) as i64 - 2;

        let memory_sample = MetricSample::new(now, CH_MEMORY, memory);
        metrics.append(memory_sample)?;
        metrics.append(MetricSample::new(now, CH_HANDLES, handles.max(0)))?;

        // The ring mirrors the memory channel; duplicate wall-clock reads
        // under heavy jitter are simply skipped.
        let _ = ring.try_push(memory_sample);

        // A "GC" every ~200 ticks drops the curve and leaves a marker.
        if tick % 200 == 0 {
            memory = (memory * 2) / 3;
            let generation = state % 3;
            events.append(
                EventSample::new(now, CH_GC, format!("Gen{generation} GC"), "gc")
                    .with_external_id(format!("gc-{tick}")),
            )?;
            tracing::debug!(tick, generation, "synthetic gc");
        }

        std::thread::sleep(period);
    }

    tracing::info!(ticks = tick, "sampler finished");
    Ok(())
}
