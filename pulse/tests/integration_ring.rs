//! Integration tests for the fixed-capacity ring store.
//!
//! These exercise the ring under realistic churn: long push sequences that
//! wrap the buffer many times, range queries against a naive oracle, and a
//! producer/consumer thread pair interleaving at the lock.

use std::sync::Arc;
use std::thread;

use pulse::{ChannelId, Extents, MetricSample, SampleRing};

fn m(t: u64, v: i64) -> MetricSample {
    MetricSample::new(t, ChannelId(0), v)
}

/// Deterministic xorshift64 walk for reproducible value sequences.
struct Walk {
    state: u64,
    value: i64,
}

impl Walk {
    fn new(seed: u64) -> Self {
        Self {
            state: seed,
            value: 0,
        }
    }

    fn next(&mut self) -> i64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.value += (self.state % 101) as i64 - 50;
        self.value
    }
}

#[test]
fn test_long_churn_extents_and_contents() {
    let ring = SampleRing::new(64);
    let mut walk = Walk::new(0x9e37_79b9_7f4a_7c15);

    for t in 1..=1_000u64 {
        ring.push(m(t, walk.next())).unwrap();

        if t % 97 == 0 {
            let contents = ring.to_vec();
            assert_eq!(contents.len(), (t as usize).min(64));
            assert!(
                contents.windows(2).all(|w| w[0].captured_at_ns < w[1].captured_at_ns),
                "contents stay strictly chronological"
            );
            assert_eq!(ring.extents(), Extents::scan(contents.iter()));
        }
    }
}

#[test]
fn test_range_queries_match_contents_filter() {
    let ring = SampleRing::new(32);
    let mut walk = Walk::new(7);
    for t in (5..=500u64).step_by(5) {
        ring.push(m(t, walk.next())).unwrap();
    }

    let contents = ring.to_vec();
    for (min, max) in [(0u64, 1000u64), (400, 450), (443, 443), (445, 445), (0, 300), (490, 600)] {
        let expected: Vec<MetricSample> = contents
            .iter()
            .filter(|s| s.captured_at_ns >= min && s.captured_at_ns <= max)
            .copied()
            .collect();
        assert_eq!(
            ring.range_to_vec(min, max).unwrap(),
            expected,
            "range [{min}, {max}]"
        );
    }
}

#[test]
fn test_producer_consumer_interleaving() {
    let ring = Arc::new(SampleRing::new(128));

    let producer = {
        let ring = Arc::clone(&ring);
        thread::spawn(move || {
            let mut walk = Walk::new(42);
            for t in 1..=2_000u64 {
                ring.push(m(t, walk.next())).unwrap();
            }
        })
    };

    let consumer = {
        let ring = Arc::clone(&ring);
        thread::spawn(move || {
            for _ in 0..500 {
                let contents = ring.to_vec();
                assert!(contents.len() <= 128);
                assert!(
                    contents.windows(2).all(|w| w[0].captured_at_ns < w[1].captured_at_ns),
                    "every snapshot is chronological"
                );
                // Each snapshot's own extents are internally consistent.
                if let Some(extents) = Extents::scan(contents.iter()) {
                    assert!(extents.min_value <= extents.max_value);
                    assert!(extents.min_ns <= extents.max_ns);
                }
            }
        })
    };

    producer.join().unwrap();
    consumer.join().unwrap();

    assert_eq!(ring.len(), 128);
    assert_eq!(ring.last_captured_ns(), Some(2_000));
    assert_eq!(ring.extents(), Extents::scan(ring.to_vec().iter()));
}

#[test]
fn test_rejected_pushes_leave_no_trace() {
    let ring = SampleRing::new(16);
    for t in [10u64, 20, 30] {
        ring.push(m(t, t as i64)).unwrap();
    }

    for bad in [30u64, 29, 1] {
        assert!(ring.push(m(bad, 999)).is_err());
    }
    assert!(!ring.try_push(m(30, 999)));

    let times: Vec<u64> = ring.to_vec().iter().map(|s| s.captured_at_ns).collect();
    assert_eq!(times, vec![10, 20, 30]);
    assert_eq!(ring.extents().unwrap().max_value, 30);
}
