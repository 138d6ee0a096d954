use crossbeam_channel::{unbounded, Receiver, Sender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchPhase {
    Down,
    Move,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchEvent {
    pub phase: TouchPhase,
    pub x: f64,
    pub y: f64,
}

impl TouchEvent {
    pub fn new(phase: TouchPhase, x: f64, y: f64) -> Self {
        Self { phase, x, y }
    }
}

/// FIFO of touch events crossing from the windowing thread to the render
/// thread. Producers clone an `InputSender`; the render thread drains the
/// whole backlog once per update step.
pub struct InputQueue {
    tx: Sender<TouchEvent>,
    rx: Receiver<TouchEvent>,
}

#[derive(Clone)]
pub struct InputSender {
    tx: Sender<TouchEvent>,
}

impl InputQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn sender(&self) -> InputSender {
        InputSender { tx: self.tx.clone() }
    }

    pub fn push(&self, event: TouchEvent) {
        let _ = self.tx.send(event);
    }

    pub fn drain(&self) -> Vec<TouchEvent> {
        self.rx.try_iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for InputQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSender {
    pub fn push(&self, event: TouchEvent) {
        // The queue outlives every sender in practice; a send after teardown
        // is silently dropped.
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_returns_events_in_push_order() {
        let queue = InputQueue::new();
        queue.push(TouchEvent::new(TouchPhase::Down, 1.0, 2.0));
        queue.push(TouchEvent::new(TouchPhase::Move, 3.0, 4.0));
        queue.push(TouchEvent::new(TouchPhase::Up, 5.0, 6.0));

        let events = queue.drain();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].phase, TouchPhase::Down);
        assert_eq!(events[1].phase, TouchPhase::Move);
        assert_eq!(events[2].phase, TouchPhase::Up);
        assert!(queue.drain().is_empty(), "second drain sees nothing");
    }

    #[test]
    fn events_pushed_after_a_drain_land_in_the_next_one() {
        let queue = InputQueue::new();
        queue.push(TouchEvent::new(TouchPhase::Down, 0.0, 0.0));
        assert_eq!(queue.drain().len(), 1);

        queue.push(TouchEvent::new(TouchPhase::Up, 0.0, 0.0));
        let events = queue.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].phase, TouchPhase::Up);
    }
}
