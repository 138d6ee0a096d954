use std::thread;
use std::time::Duration;

use siskin_engine::input::{InputQueue, TouchEvent, TouchPhase};

#[test]
fn concurrent_pushes_drain_in_order_exactly_once() {
    const PRODUCERS: usize = 3;
    const EVENTS_PER_PRODUCER: usize = 500;

    let queue = InputQueue::new();
    let mut handles = Vec::new();
    for producer in 0..PRODUCERS {
        let sender = queue.sender();
        handles.push(thread::spawn(move || {
            for seq in 0..EVENTS_PER_PRODUCER {
                sender.push(TouchEvent::new(TouchPhase::Move, producer as f64, seq as f64));
                if seq % 64 == 0 {
                    thread::yield_now();
                }
            }
        }));
    }

    // Drain concurrently with the producers, like the render thread does.
    let mut seen: Vec<Vec<f64>> = vec![Vec::new(); PRODUCERS];
    let mut total = 0;
    while total < PRODUCERS * EVENTS_PER_PRODUCER {
        let batch = queue.drain();
        if batch.is_empty() {
            thread::sleep(Duration::from_millis(1));
            continue;
        }
        for event in batch {
            seen[event.x as usize].push(event.y);
            total += 1;
        }
    }
    for handle in handles {
        handle.join().expect("producer thread");
    }

    assert!(queue.drain().is_empty(), "no stragglers after all events were seen");
    for (producer, sequence) in seen.iter().enumerate() {
        assert_eq!(sequence.len(), EVENTS_PER_PRODUCER, "producer {producer} lost or duplicated events");
        for (expected, got) in sequence.iter().enumerate() {
            assert_eq!(*got, expected as f64, "producer {producer} events out of order");
        }
    }
}

#[test]
fn down_move_up_sequence_is_never_reordered() {
    let queue = InputQueue::new();
    let sender = queue.sender();
    sender.push(TouchEvent::new(TouchPhase::Down, 10.0, 10.0));
    sender.push(TouchEvent::new(TouchPhase::Move, 12.0, 14.0));
    sender.push(TouchEvent::new(TouchPhase::Up, 12.0, 14.0));

    let phases: Vec<TouchPhase> = queue.drain().iter().map(|e| e.phase).collect();
    assert_eq!(phases, vec![TouchPhase::Down, TouchPhase::Move, TouchPhase::Up]);
}
