//! Edge capture: lock-free handoff from the GPIO interrupt to the decoder
//!
//! The edge ISR runs above the RTOS and may not block, allocate or touch
//! task-side locks, so captured edges travel through a single-producer
//! single-consumer ring buffer: the ISR owns the write index, the decode
//! task owns the read index, and each index is published with a
//! release/acquire pair so a slot is never read while it is being written.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::io::time_base::{Tick, TimeBase};
use crate::platform::traits::{CaptureTimer, GpioPort};

/// Number of slots in the edge ring; must be a power of two
pub const EDGE_RING_SIZE: usize = 64;

const RING_MASK: usize = EDGE_RING_SIZE - 1;

/// One captured GPIO transition
///
/// Immutable once enqueued; produced only by the edge ISR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EdgeEvent {
    /// Counter value at the instant the ISR ran
    pub timestamp: Tick,
    /// Level of every line on the port at that instant
    pub levels: u32,
}

impl EdgeEvent {
    const EMPTY: EdgeEvent = EdgeEvent {
        timestamp: 0,
        levels: 0,
    };
}

/// Fixed-capacity SPSC ring buffer of edge events
///
/// Invariants: empty iff `read == write`; full iff `write + 1 == read`
/// (mod capacity), in which case the producer drops the incoming event
/// rather than touch the consumer's index. One slot stays unused, so the
/// ring holds at most `EDGE_RING_SIZE - 1` events.
pub struct EdgeRing {
    slots: [UnsafeCell<EdgeEvent>; EDGE_RING_SIZE],
    read: AtomicUsize,
    write: AtomicUsize,
}

// Each slot is written only by the producer before it publishes the write
// index, and read only by the consumer after it observes that publish.
unsafe impl Sync for EdgeRing {}

impl EdgeRing {
    /// Create an empty ring
    pub const fn new() -> Self {
        Self {
            slots: [const { UnsafeCell::new(EdgeEvent::EMPTY) }; EDGE_RING_SIZE],
            read: AtomicUsize::new(0),
            write: AtomicUsize::new(0),
        }
    }

    /// Split the ring into its producer (ISR) and consumer (task) halves
    pub fn split(&mut self) -> (EdgeProducer<'_>, EdgeConsumer<'_>) {
        (EdgeProducer { ring: self }, EdgeConsumer { ring: self })
    }

    /// Number of events currently buffered
    pub fn len(&self) -> usize {
        self.write
            .load(Ordering::Relaxed)
            .wrapping_sub(self.read.load(Ordering::Relaxed))
            & RING_MASK
    }

    /// Whether no events are buffered
    pub fn is_empty(&self) -> bool {
        self.read.load(Ordering::Relaxed) == self.write.load(Ordering::Relaxed)
    }
}

impl Default for EdgeRing {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer half of an [`EdgeRing`]; owned by the edge ISR
pub struct EdgeProducer<'a> {
    ring: &'a EdgeRing,
}

impl EdgeProducer<'_> {
    /// Enqueue one event
    ///
    /// Returns `false` if the ring is full; the event is dropped and the
    /// indices are left untouched.
    pub fn push(&mut self, event: EdgeEvent) -> bool {
        let ring = self.ring;
        let write = ring.write.load(Ordering::Relaxed);
        let next = (write + 1) & RING_MASK;
        if next == ring.read.load(Ordering::Acquire) {
            return false;
        }
        // SAFETY: slot `write` is outside [read, write), so the consumer
        // will not read it until the store below makes it visible.
        unsafe {
            *ring.slots[write].get() = event;
        }
        ring.write.store(next, Ordering::Release);
        true
    }
}

/// Consumer half of an [`EdgeRing`]; owned by the decode task
pub struct EdgeConsumer<'a> {
    ring: &'a EdgeRing,
}

impl EdgeConsumer<'_> {
    /// Dequeue the oldest event, if any
    pub fn pop(&mut self) -> Option<EdgeEvent> {
        let ring = self.ring;
        let read = ring.read.load(Ordering::Relaxed);
        if read == ring.write.load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: slot `read` was published by the producer's release
        // store, and the producer will not reuse it until `read` advances.
        let event = unsafe { *ring.slots[read].get() };
        ring.read.store((read + 1) & RING_MASK, Ordering::Release);
        Some(event)
    }
}

/// GPIO edge interrupt handler state
///
/// On every monitored transition: read the counter, clear the hardware
/// interrupt flags (a transition after the clear raises a fresh interrupt),
/// snapshot the whole port and enqueue the pair. No decoding happens here.
pub struct EdgeCapture<'a, T: CaptureTimer> {
    time: TimeBase<T>,
    events: EdgeProducer<'a>,
    irq_mask: u32,
}

impl<'a, T: CaptureTimer> EdgeCapture<'a, T> {
    /// Create the handler for the lines in `irq_mask`
    pub fn new(timer: T, events: EdgeProducer<'a>, irq_mask: u32) -> Self {
        Self {
            time: TimeBase::new(timer),
            events,
            irq_mask,
        }
    }

    /// Interrupt entry point; bounded, lock-free
    pub fn on_edge_irq<P: GpioPort>(&mut self, port: &mut P) {
        let timestamp = self.time.now();
        port.clear_edge_interrupt(self.irq_mask);
        let levels = port.read_levels();
        // full ring: drop this edge, the decoder resynchronizes next frame
        let _ = self.events.push(EdgeEvent { timestamp, levels });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::{MockCaptureTimer, MockPort};

    fn event(timestamp: Tick) -> EdgeEvent {
        EdgeEvent {
            timestamp,
            levels: 0,
        }
    }

    #[test]
    fn test_empty_ring_pops_nothing() {
        let mut ring = EdgeRing::new();
        let (_, mut consumer) = ring.split();
        assert_eq!(consumer.pop(), None);
    }

    #[test]
    fn test_fifo_order() {
        let mut ring = EdgeRing::new();
        let (mut producer, mut consumer) = ring.split();

        for t in 0..5 {
            assert!(producer.push(event(t)));
        }
        for t in 0..5 {
            assert_eq!(consumer.pop(), Some(event(t)));
        }
        assert_eq!(consumer.pop(), None);
    }

    #[test]
    fn test_full_ring_drops_newest() {
        let mut ring = EdgeRing::new();
        let (mut producer, mut consumer) = ring.split();

        // one slot stays unused
        for t in 0..(EDGE_RING_SIZE as u16 - 1) {
            assert!(producer.push(event(t)));
        }
        assert!(!producer.push(event(9999)));

        // nothing already queued was lost or reordered
        for t in 0..(EDGE_RING_SIZE as u16 - 1) {
            assert_eq!(consumer.pop(), Some(event(t)));
        }
        assert_eq!(consumer.pop(), None);
    }

    #[test]
    fn test_wraparound_reuse() {
        let mut ring = EdgeRing::new();
        let (mut producer, mut consumer) = ring.split();

        // cycle through the ring several times to exercise index wrap
        for round in 0..4u16 {
            for t in 0..50 {
                assert!(producer.push(event(round * 100 + t)));
            }
            for t in 0..50 {
                assert_eq!(consumer.pop(), Some(event(round * 100 + t)));
            }
        }
        assert!(ring.is_empty());
    }

    #[test]
    fn test_interleaved_push_pop() {
        let mut ring = EdgeRing::new();
        let (mut producer, mut consumer) = ring.split();

        // pop two of every three pushes so occupancy stays near a third
        // of the ring while still wrapping the indices several times
        let mut next_pop = 0u16;
        for t in 0..180u16 {
            assert!(producer.push(event(t)));
            if t % 3 != 0 {
                assert_eq!(consumer.pop(), Some(event(next_pop)));
                next_pop += 1;
            }
        }
        while let Some(ev) = consumer.pop() {
            assert_eq!(ev, event(next_pop));
            next_pop += 1;
        }
        assert_eq!(next_pop, 180);
    }

    #[test]
    fn test_concurrent_producer_consumer() {
        let ring = EdgeRing::new();
        let mut producer = EdgeProducer { ring: &ring };
        let mut consumer = EdgeConsumer { ring: &ring };

        const TOTAL: u16 = 10_000;
        std::thread::scope(|s| {
            s.spawn(move || {
                for t in 0..TOTAL {
                    // spin until a slot frees up
                    while !producer.push(event(t)) {
                        std::hint::spin_loop();
                    }
                }
            });
            s.spawn(move || {
                let mut expected = 0u16;
                while expected < TOTAL {
                    if let Some(ev) = consumer.pop() {
                        assert_eq!(ev.timestamp, expected);
                        expected += 1;
                    } else {
                        std::hint::spin_loop();
                    }
                }
            });
        });
    }

    #[test]
    fn test_edge_capture_snapshots_port() {
        let timer = MockCaptureTimer::starting_at(100);
        let mut port = MockPort::new();
        port.configure_input(0b100).unwrap();

        let mut ring = EdgeRing::new();
        let (producer, mut consumer) = ring.split();
        let mut capture = EdgeCapture::new(&timer, producer, 0b100);

        port.set_input_levels(0b100);
        capture.on_edge_irq(&mut port);
        assert_eq!(port.pending_edges(), 0);

        timer.advance(1875);
        port.set_input_levels(0);
        capture.on_edge_irq(&mut port);

        assert_eq!(
            consumer.pop(),
            Some(EdgeEvent {
                timestamp: 100,
                levels: 0b100
            })
        );
        assert_eq!(
            consumer.pop(),
            Some(EdgeEvent {
                timestamp: 1975,
                levels: 0
            })
        );
    }
}
