//! Thread-safe FIFO buffer of received publisher signals.
//!
//! Multiple-producer / single-consumer over `std::sync::mpsc`. A
//! publisher's scheduler may call `on_next`/`on_error`/`on_complete`
//! from any thread; the driver is always the sole consumer.

use std::sync::mpsc;
use std::time::{Duration, Instant};

use verify_types::Signal;

/// Producer-side handle. Cheaply `Clone`d — every reactive-streams
/// callback on every thread gets its own clone.
pub struct SignalQueue<T, E> {
    sender: mpsc::Sender<Signal<T, E>>,
}

impl<T, E> Clone for SignalQueue<T, E> {
    fn clone(&self) -> Self {
        SignalQueue {
            sender: self.sender.clone(),
        }
    }
}

impl<T, E> SignalQueue<T, E> {
    /// Non-blocking, wait-free relative to other enqueues. A disconnected
    /// receiver (driver already finished) simply drops the signal.
    pub fn enqueue(&self, signal: Signal<T, E>) {
        let _ = self.sender.send(signal);
    }
}

/// Consumer-side handle, owned solely by the driver.
pub struct SignalQueueReceiver<T, E> {
    receiver: mpsc::Receiver<Signal<T, E>>,
}

impl<T, E> SignalQueueReceiver<T, E> {
    /// Blocks until a signal arrives or `deadline` passes, whichever is
    /// first. `None` deadline blocks indefinitely. Returns `None` on
    /// timeout.
    pub fn dequeue(&self, deadline: Option<Instant>) -> Option<Signal<T, E>> {
        match deadline {
            None => self.receiver.recv().ok(),
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining == Duration::ZERO {
                    return self.receiver.try_recv().ok();
                }
                self.receiver.recv_timeout(remaining).ok()
            }
        }
    }
}

/// Construct a fresh producer/consumer pair.
pub fn channel<T, E>() -> (SignalQueue<T, E>, SignalQueueReceiver<T, E>) {
    let (tx, rx) = mpsc::channel();
    (SignalQueue { sender: tx }, SignalQueueReceiver { receiver: rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_fifo_order() {
        let (tx, rx) = channel::<u32, String>();
        tx.enqueue(Signal::Next(1));
        tx.enqueue(Signal::Next(2));
        tx.enqueue(Signal::Complete);

        let deadline = Some(Instant::now() + Duration::from_millis(50));
        assert!(matches!(rx.dequeue(deadline), Some(Signal::Next(1))));
        assert!(matches!(rx.dequeue(deadline), Some(Signal::Next(2))));
        assert!(matches!(rx.dequeue(deadline), Some(Signal::Complete)));
    }

    #[test]
    fn dequeue_times_out_on_empty_queue() {
        let (_tx, rx) = channel::<u32, String>();
        let deadline = Some(Instant::now() + Duration::from_millis(20));
        assert!(rx.dequeue(deadline).is_none());
    }

    #[test]
    fn producers_from_multiple_threads_preserve_each_sub_order() {
        let (tx, rx) = channel::<u32, String>();
        let tx2 = tx.clone();
        let handle = std::thread::spawn(move || {
            tx2.enqueue(Signal::Next(10));
            tx2.enqueue(Signal::Next(11));
        });
        handle.join().unwrap();
        tx.enqueue(Signal::Complete);

        let deadline = Some(Instant::now() + Duration::from_millis(50));
        assert!(matches!(rx.dequeue(deadline), Some(Signal::Next(10))));
        assert!(matches!(rx.dequeue(deadline), Some(Signal::Next(11))));
        assert!(matches!(rx.dequeue(deadline), Some(Signal::Complete)));
    }
}
