// SPDX-License-Identifier: Apache-2.0

//! Shared ring buffer protocol between the privileged producer and the
//! user-space listener.
//!
//! The ring is a fixed array of records plus two free-running cursors.
//! `head` is written only by the producer, `tail` only by the consumer;
//! that single-writer-per-cursor discipline is the entire synchronization
//! story - no locks, no CAS. The producer's Release store on `head` pairs
//! with the consumer's Acquire load, so observing a new head value also
//! makes the just-written slot contents visible.
//!
//! Cursors are unbounded counts, not indices; the physical slot is
//! `count & (RING_CAPACITY - 1)`. Wraparound needs no special-casing as long
//! as arithmetic stays on the counts (`wrapping_sub` distances), never on
//! the masked result.
//!
//! The single-writer roles are encoded as types: only [`RingProducer`] can
//! publish `head`, only [`RingConsumer`] can publish `tail`.

use std::cell::UnsafeCell;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::event::IrqEvent;

/// Number of slots in the shared ring.
///
/// Compile-time contract with the producer build; power of two so slot
/// lookup is a mask.
pub const RING_CAPACITY: usize = 256;

const _: () = assert!(RING_CAPACITY.is_power_of_two());

const INDEX_MASK: u32 = (RING_CAPACITY as u32) - 1;

/// The mapped region layout, byte-for-byte what the producer allocates.
///
/// `UnsafeCell` is `repr(transparent)`, and `AtomicU32` has the layout of
/// `u32`, so this matches the producer's `{ u32 head; u32 tail; slots[N] }`
/// declaration exactly.
#[repr(C)]
pub struct EventRing {
    head: AtomicU32,
    tail: AtomicU32,
    slots: [UnsafeCell<IrqEvent>; RING_CAPACITY],
}

// SAFETY: all shared mutation goes through the atomics or through slot cells
// whose visibility the cursor protocol orders; the role handles enforce the
// single-writer discipline.
unsafe impl Send for EventRing {}
unsafe impl Sync for EventRing {}

impl EventRing {
    /// Total footprint of the ring, before page rounding.
    pub const BYTE_SIZE: usize = std::mem::size_of::<EventRing>();

    /// Fresh all-zero ring in heap memory, as the producer allocates it
    /// (head = tail = 0, the empty state). Backing storage for tests and
    /// benches that do not go through a device mapping.
    pub fn new_boxed() -> Box<EventRing> {
        // SAFETY: EventRing is repr(C) plain old data behind atomics and
        // cells; all-zero bytes are its valid initial state.
        unsafe { Box::new(std::mem::zeroed()) }
    }
}

const _: () =
    assert!(EventRing::BYTE_SIZE == 8 + RING_CAPACITY * crate::event::EVENT_SIZE);
const _: () = assert!(std::mem::offset_of!(EventRing, head) == 0);
const _: () = assert!(std::mem::offset_of!(EventRing, tail) == 4);
const _: () = assert!(std::mem::offset_of!(EventRing, slots) == 8);

/// Producer-side handle: the only type that may advance `head`.
///
/// In production this role lives in the privileged producer's own concurrency
/// domain; the handle here backs the simulated producer used by tests and
/// benches, and documents the conformance contract for the real one.
pub struct RingProducer {
    ring: NonNull<EventRing>,
    /// Local shadow of `head`; the producer is its sole writer.
    head: u32,
}

// SAFETY: the handle owns no thread-affine state; the ring itself is Sync.
unsafe impl Send for RingProducer {}

impl RingProducer {
    /// Build a producer over a live ring.
    ///
    /// # Safety
    /// `ring` must point to a valid `EventRing` that outlives this handle,
    /// and no other producer handle may exist for it.
    pub unsafe fn from_raw(ring: NonNull<EventRing>) -> Self {
        let head = unsafe { ring.as_ref() }.head.load(Ordering::Relaxed);
        Self { ring, head }
    }

    fn ring(&self) -> &EventRing {
        // SAFETY: liveness is guaranteed by the from_raw contract.
        unsafe { self.ring.as_ref() }
    }

    /// Append one record and publish it.
    ///
    /// The slot is written first; the Release store on `head` is what makes
    /// it visible. A consumer that lags by more than [`RING_CAPACITY`] has
    /// its unread slots silently overwritten - the structure does not detect
    /// this, sequence-gap accounting downstream does.
    pub fn publish(&mut self, event: IrqEvent) {
        let ring = self.ring();
        let slot = (self.head & INDEX_MASK) as usize;
        // SAFETY: the consumer will not read this slot until it observes the
        // head store below; overwritten slots are an accepted loss mode.
        unsafe {
            *ring.slots[slot].get() = event;
        }
        let new_head = self.head.wrapping_add(1);
        ring.head.store(new_head, Ordering::Release);
        self.head = new_head;
    }

    /// The published consumer cursor, as the producer side sees it.
    ///
    /// The producer never writes `tail`; this read exists so a producer can
    /// detect overrun (head outpacing tail by more than the capacity).
    pub fn published_tail(&self) -> u32 {
        self.ring().tail.load(Ordering::Acquire)
    }

    /// Count published so far by this handle.
    pub fn head(&self) -> u32 {
        self.head
    }
}

/// Consumer-side handle: the only type that may advance `tail`.
pub struct RingConsumer {
    ring: NonNull<EventRing>,
    /// Local shadow of `tail`; the consumer is its sole writer.
    tail: u32,
}

// SAFETY: same argument as RingProducer.
unsafe impl Send for RingConsumer {}

impl RingConsumer {
    /// Build a consumer over a live ring.
    ///
    /// # Safety
    /// `ring` must point to a valid `EventRing` that outlives this handle,
    /// and no other consumer handle may exist for it.
    pub unsafe fn from_raw(ring: NonNull<EventRing>) -> Self {
        let tail = unsafe { ring.as_ref() }.tail.load(Ordering::Relaxed);
        Self { ring, tail }
    }

    fn ring(&self) -> &EventRing {
        // SAFETY: liveness is guaranteed by the from_raw contract.
        unsafe { self.ring.as_ref() }
    }

    /// Jump the local tail to the current head, dropping any backlog.
    ///
    /// Called once on attach so a freshly started listener never replays
    /// records published before it existed. Returns the count skipped.
    pub fn resync(&mut self) -> u32 {
        let head = self.ring().head.load(Ordering::Acquire);
        let skipped = head.wrapping_sub(self.tail);
        self.tail = head;
        self.publish_tail();
        skipped
    }

    /// Records currently published but not yet drained.
    pub fn available(&self) -> u32 {
        self.ring().head.load(Ordering::Acquire).wrapping_sub(self.tail)
    }

    /// Drain everything in `[tail, head)` in publish order, invoking `f`
    /// once per record, then publish the new tail. Returns the count drained.
    pub fn drain(&mut self, mut f: impl FnMut(IrqEvent)) -> u32 {
        // Copy the pointer to a local so reading through it does not hold a
        // borrow of `self` across the `self.tail` updates below.
        let ring_ptr = self.ring;
        // SAFETY: liveness is guaranteed by the from_raw contract.
        let ring = unsafe { ring_ptr.as_ref() };
        let head = ring.head.load(Ordering::Acquire);
        let mut drained = 0u32;
        while self.tail != head {
            let slot = (self.tail & INDEX_MASK) as usize;
            // SAFETY: slot contents at counts below `head` were published by
            // the Release store we acquired through `head`.
            let event = unsafe { std::ptr::read(ring.slots[slot].get()) };
            f(event);
            self.tail = self.tail.wrapping_add(1);
            drained += 1;
        }
        if drained > 0 {
            self.publish_tail();
        }
        drained
    }

    fn publish_tail(&self) {
        self.ring().tail.store(self.tail, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Producer/consumer pair over a fresh heap ring. The ring box must
    /// outlive the handles, which the test scope guarantees.
    fn handles(ring: &EventRing) -> (RingProducer, RingConsumer) {
        let ptr = NonNull::from(ring);
        // SAFETY: single pair per ring, ring outlives both handles.
        unsafe { (RingProducer::from_raw(ptr), RingConsumer::from_raw(ptr)) }
    }

    fn event(sequence: u32) -> IrqEvent {
        IrqEvent {
            timestamp_ns: u64::from(sequence) * 1_000,
            sequence,
            pin_state: sequence & 1,
        }
    }

    #[test]
    fn test_publish_then_drain_delivers_in_order() {
        let ring = EventRing::new_boxed();
        let (mut producer, mut consumer) = handles(&ring);

        for seq in 1..=10 {
            producer.publish(event(seq));
        }
        assert_eq!(consumer.available(), 10);

        let mut seen = Vec::new();
        let drained = consumer.drain(|ev| seen.push(ev.sequence));

        assert_eq!(drained, 10);
        assert_eq!(seen, (1..=10).collect::<Vec<u32>>());
        assert_eq!(consumer.available(), 0);
    }

    #[test]
    fn test_slot_roundtrip_is_bit_identical() {
        let ring = EventRing::new_boxed();
        let (mut producer, mut consumer) = handles(&ring);

        let original = IrqEvent {
            timestamp_ns: 0x0123_4567_89AB_CDEF,
            sequence: 7,
            pin_state: 0xFFFF_FFFF,
        };
        producer.publish(original);

        let mut read_back = None;
        consumer.drain(|ev| read_back = Some(ev));
        assert_eq!(read_back, Some(original));
    }

    #[test]
    fn test_interleaved_publish_and_drain() {
        let ring = EventRing::new_boxed();
        let (mut producer, mut consumer) = handles(&ring);

        let mut seen = Vec::new();
        let mut next_seq = 1u32;
        for batch in [1u32, 3, 2, 5] {
            for _ in 0..batch {
                producer.publish(event(next_seq));
                next_seq += 1;
            }
            consumer.drain(|ev| seen.push(ev.sequence));
        }

        assert_eq!(seen, (1..next_seq).collect::<Vec<u32>>());
    }

    #[test]
    fn test_resync_drops_backlog() {
        let ring = EventRing::new_boxed();
        let (mut producer, mut consumer) = handles(&ring);

        for seq in 1..=5 {
            producer.publish(event(seq));
        }

        let skipped = consumer.resync();
        assert_eq!(skipped, 5);
        assert_eq!(consumer.available(), 0);

        // The first drain after resync observes only post-resync records.
        producer.publish(event(6));
        let mut seen = Vec::new();
        consumer.drain(|ev| seen.push(ev.sequence));
        assert_eq!(seen, vec![6]);
    }

    #[test]
    fn test_tail_published_for_producer_side_overrun_checks() {
        let ring = EventRing::new_boxed();
        let (mut producer, mut consumer) = handles(&ring);

        for seq in 1..=4 {
            producer.publish(event(seq));
        }
        assert_eq!(producer.published_tail(), 0);

        consumer.drain(|_| {});
        assert_eq!(producer.published_tail(), 4);
    }

    #[test]
    fn test_overflow_overwrites_without_corruption() {
        let ring = EventRing::new_boxed();
        let (mut producer, mut consumer) = handles(&ring);

        let total = RING_CAPACITY as u32 + 5;
        for seq in 1..=total {
            producer.publish(event(seq));
        }

        let mut seen = Vec::new();
        consumer.drain(|ev| {
            // Every record read is internally consistent even when the slot
            // was overwritten before the first drain.
            assert_eq!(ev.timestamp_ns, u64::from(ev.sequence) * 1_000);
            seen.push(ev.sequence);
        });

        // The oldest five counts alias slots already overwritten, so fewer
        // than `total` distinct sequence values survive.
        let distinct: std::collections::HashSet<u32> = seen.iter().copied().collect();
        assert!(distinct.len() < total as usize);
        assert!(seen.contains(&total));
        assert!(!distinct.contains(&0));
    }

    #[test]
    fn test_cursor_wraparound_preserves_window() {
        let ring = EventRing::new_boxed();
        // Seed both cursors near the u32 limit, as a long-lived session
        // would reach, and check the window survives the wrap.
        ring.head.store(u32::MAX - 2, Ordering::Release);
        ring.tail.store(u32::MAX - 2, Ordering::Release);
        let (mut producer, mut consumer) = handles(&ring);

        for seq in 1..=6 {
            producer.publish(event(seq));
        }
        assert_eq!(consumer.available(), 6);

        let mut seen = Vec::new();
        let drained = consumer.drain(|ev| seen.push(ev.sequence));
        assert_eq!(drained, 6);
        assert_eq!(seen, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_cross_thread_publish_consume() {
        let ring = EventRing::new_boxed();
        let (mut producer, mut consumer) = handles(&ring);

        let publisher = std::thread::spawn(move || {
            for seq in 1..=1_000 {
                producer.publish(event(seq));
                if seq % 64 == 0 {
                    std::thread::yield_now();
                }
            }
        });

        let mut last = 0u32;
        let mut delivered = 0u32;
        while delivered < 1_000 {
            consumer.drain(|ev| {
                // Publish order survives the thread boundary; the consumer
                // keeps up here, so no gaps either.
                assert_eq!(ev.sequence, last + 1);
                last = ev.sequence;
                delivered += 1;
            });
            std::thread::yield_now();
        }

        publisher.join().expect("publisher thread panicked");
        assert_eq!(delivered, 1_000);
    }
}
