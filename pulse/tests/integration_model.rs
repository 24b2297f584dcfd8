//! Integration tests for the segmented channel model.
//!
//! Exercises a full collector-style lifecycle: channels created on demand,
//! segment rotation per group, historical trimming, aggregate boundary
//! ratcheting across the tree, and the cascade on close.

use std::sync::{Arc, Mutex};

use pulse::{BatchBounds, DataPoint, ModelEvent, Sink};

fn p(t: u64, v: i64) -> DataPoint {
    DataPoint::new(t, v)
}

#[test]
fn test_collector_lifecycle() {
    let sink = Sink::new("device-7");

    // Channels appear on demand and are unique by name.
    let memory = sink.create_channel("memory").unwrap();
    let handles = sink.create_channel("handles").unwrap();
    assert!(Arc::ptr_eq(&memory, &sink.create_channel("memory").unwrap()));

    // Two groups on one channel, each with its own editable run.
    let heap = memory.open_segment("heap", 0).unwrap();
    let stack = memory.open_segment("stack", 0).unwrap();
    heap.add_points(&[p(10, 100), p(20, 140), p(30, 120)], None).unwrap();
    stack
        .add_points(
            &[p(15, 7), p(25, 9)],
            Some(BatchBounds {
                min_value: 7,
                max_value: 9,
                end_ns: 25,
            }),
        )
        .unwrap();

    assert_eq!(memory.end_ns(), Some(30));
    assert_eq!(sink.end_ns(), Some(30));

    // Rotating a group closes its previous run and leaves it queryable.
    let heap2 = memory.open_segment("heap", 40).unwrap();
    assert!(!heap.is_editable());
    assert!(heap.add_point(p(50, 1)).is_err());
    assert_eq!(heap.points().len(), 3);
    heap2.add_point(p(45, 130)).unwrap();

    assert_eq!(memory.segments().len(), 3);
    assert_eq!(memory.end_ns(), Some(45));

    // The other channel ratchets independently.
    let fds = handles.open_segment("fd", 0).unwrap();
    fds.add_point(p(60, 12)).unwrap();
    assert_eq!(handles.end_ns(), Some(60));
    assert_eq!(memory.end_ns(), Some(45));
    assert_eq!(sink.end_ns(), Some(60));

    // Trimming a historical run shrinks its own extents but never the
    // aggregates.
    heap.remove_before(15).unwrap();
    assert_eq!(heap.points().len(), 2);
    assert_eq!(heap.min_value(), Some(120));
    assert_eq!(memory.end_ns(), Some(45));

    // Closing the sink cascades to everything still open.
    sink.close();
    assert!(!heap2.is_editable());
    assert!(!fds.is_editable());
    assert!(memory.is_closed());
    assert!(handles.is_closed());
    assert!(sink.is_closed());

    // Aggregates stay readable after close.
    assert_eq!(sink.end_ns(), Some(60));
}

#[test]
fn test_singleton_per_group_at_every_step() {
    let sink = Sink::new("device-7");
    let channel = sink.create_channel("memory").unwrap();

    for round in 0..5u64 {
        let segment = channel.open_segment("heap", round * 100).unwrap();
        segment.add_point(p(round * 100 + 10, round as i64)).unwrap();

        // Exactly one editable segment for the group, and it is the newest.
        let editable: Vec<_> = channel
            .segments()
            .into_iter()
            .filter(|s| s.group() == "heap" && s.is_editable())
            .collect();
        assert_eq!(editable.len(), 1);
        assert_eq!(editable[0].id(), segment.id());
    }
    assert_eq!(channel.segments().len(), 5);
}

#[test]
fn test_boundary_events_fire_outside_locks() {
    let sink = Sink::new("device-7");
    let channel = sink.create_channel("memory").unwrap();
    let segment = channel.open_segment("heap", 0).unwrap();

    // The handler re-enters the tree it was notified about: reading the
    // channel and sink aggregates from inside a BoundaryChanged callback
    // must not deadlock, and observes the already-raised values.
    let seen: Arc<Mutex<Vec<(u64, Option<u64>, Option<u64>)>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let sink_inner = Arc::clone(&sink);
        let channel_inner = Arc::clone(&channel);
        let seen = Arc::clone(&seen);
        sink.subscribe(move |event| {
            if let ModelEvent::BoundaryChanged { end_ns, .. } = event {
                seen.lock().unwrap().push((
                    *end_ns,
                    channel_inner.end_ns(),
                    sink_inner.end_ns(),
                ));
            }
        });
    }

    segment.add_point(p(100, 1)).unwrap();
    segment.add_point(p(200, 2)).unwrap();
    // A non-raising append stays silent.
    segment.add_points(&[p(150, 3)], None).unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], (100, Some(100), Some(100)));
    assert_eq!(seen[1], (200, Some(200), Some(200)));
}

#[test]
fn test_closed_channel_rejects_all_editing_entry_points() {
    let sink = Sink::new("device-7");
    let channel = sink.create_channel("memory").unwrap();
    let segment = channel.open_segment("heap", 0).unwrap();
    channel.close();

    assert!(channel.open_segment("heap", 0).is_err());
    assert!(channel.current_segment("heap").is_err());
    assert!(channel.close_segment(&segment).is_err());
    assert!(segment.add_point(p(1, 1)).is_err());

    // The sink itself is still editable: only the channel closed.
    assert!(!sink.is_closed());
    sink.create_channel("gc").unwrap();
}
