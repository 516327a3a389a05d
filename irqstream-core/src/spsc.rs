// SPDX-License-Identifier: Apache-2.0

//! Bounded SPSC queue for moving records off the real-time thread.
//!
//! The drain-loop callback must never block, so consumers that do slower
//! work (printing, aggregation, export) push each record into one of these
//! and drain it from a non-real-time thread. Same cursor-pair protocol as
//! the shared ring, one hop outward: `head` written only by the sender,
//! `tail` only by the receiver, Release publish paired with Acquire load.
//!
//! Overflow policy is explicit and local: a full queue drops the newest
//! record (`send` returns `false`) rather than blocking the sender.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

struct SpscRing<T> {
    head: AtomicU32,
    tail: AtomicU32,
    mask: u32,
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
}

// SAFETY: each cursor has exactly one writer; slot visibility is ordered by
// the cursor protocol, and T crosses threads by value.
unsafe impl<T: Send> Send for SpscRing<T> {}
unsafe impl<T: Send> Sync for SpscRing<T> {}

impl<T> Drop for SpscRing<T> {
    fn drop(&mut self) {
        // Drop any records still queued between the cursors.
        let head = *self.head.get_mut();
        let mut tail = *self.tail.get_mut();
        while tail != head {
            let slot = (tail & self.mask) as usize;
            // SAFETY: counts in [tail, head) were fully written by send.
            unsafe { (*self.slots[slot].get()).assume_init_drop() };
            tail = tail.wrapping_add(1);
        }
    }
}

/// Create a bounded SPSC channel with the given capacity.
///
/// # Panics
/// Panics if `capacity` is zero or not a power of two.
pub fn channel<T: Send>(capacity: usize) -> (SpscSender<T>, SpscReceiver<T>) {
    assert!(
        capacity > 0 && capacity.is_power_of_two(),
        "spsc capacity must be a nonzero power of two, got {capacity}"
    );
    assert!(capacity <= u32::MAX as usize / 2);

    let slots = (0..capacity)
        .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
        .collect::<Vec<_>>()
        .into_boxed_slice();

    let ring = Arc::new(SpscRing {
        head: AtomicU32::new(0),
        tail: AtomicU32::new(0),
        mask: (capacity as u32) - 1,
        slots,
    });

    (
        SpscSender {
            ring: Arc::clone(&ring),
            head: 0,
        },
        SpscReceiver { ring, tail: 0 },
    )
}

/// Sending half. Exactly one may exist per channel.
pub struct SpscSender<T> {
    ring: Arc<SpscRing<T>>,
    /// Local shadow of `head`; the sender is its sole writer.
    head: u32,
}

impl<T: Send> SpscSender<T> {
    /// Push one record. Returns `false` - and drops the record - when the
    /// queue is full. Never blocks.
    pub fn send(&mut self, value: T) -> bool {
        let ring = &*self.ring;
        let tail = ring.tail.load(Ordering::Acquire);
        if self.head.wrapping_sub(tail) > ring.mask {
            return false;
        }

        let slot = (self.head & ring.mask) as usize;
        // SAFETY: the receiver will not read this slot until it observes the
        // head store below, and the fullness check above keeps us off slots
        // it has not yet released.
        unsafe { (*ring.slots[slot].get()).write(value) };

        self.head = self.head.wrapping_add(1);
        ring.head.store(self.head, Ordering::Release);
        true
    }

    /// Records currently queued.
    pub fn len(&self) -> usize {
        self.head.wrapping_sub(self.ring.tail.load(Ordering::Acquire)) as usize
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Receiving half. Exactly one may exist per channel.
pub struct SpscReceiver<T> {
    ring: Arc<SpscRing<T>>,
    /// Local shadow of `tail`; the receiver is its sole writer.
    tail: u32,
}

impl<T: Send> SpscReceiver<T> {
    /// Pop the oldest record, or `None` when the queue is empty.
    /// Never blocks.
    pub fn recv(&mut self) -> Option<T> {
        let ring = &*self.ring;
        let head = ring.head.load(Ordering::Acquire);
        if self.tail == head {
            return None;
        }

        let slot = (self.tail & ring.mask) as usize;
        // SAFETY: counts below `head` were fully written before the sender's
        // Release store on head.
        let value = unsafe { (*ring.slots[slot].get()).assume_init_read() };

        self.tail = self.tail.wrapping_add(1);
        ring.tail.store(self.tail, Ordering::Release);
        Some(value)
    }

    /// Records currently queued.
    pub fn len(&self) -> usize {
        self.ring.head.load(Ordering::Acquire).wrapping_sub(self.tail) as usize
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_recv_in_order() {
        let (mut tx, mut rx) = channel::<u32>(8);
        for i in 0..5 {
            assert!(tx.send(i));
        }
        for i in 0..5 {
            assert_eq!(rx.recv(), Some(i));
        }
        assert_eq!(rx.recv(), None);
    }

    #[test]
    fn test_full_queue_drops_newest() {
        let (mut tx, mut rx) = channel::<u32>(4);
        for i in 0..4 {
            assert!(tx.send(i));
        }
        // Queue full: the newest record is the one dropped.
        assert!(!tx.send(99));
        assert_eq!(tx.len(), 4);

        let drained: Vec<u32> = std::iter::from_fn(|| rx.recv()).collect();
        assert_eq!(drained, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_send_after_drain_reuses_slots() {
        let (mut tx, mut rx) = channel::<u32>(2);
        for round in 0..100u32 {
            assert!(tx.send(round));
            assert_eq!(rx.recv(), Some(round));
        }
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn test_non_power_of_two_capacity_rejected() {
        let _ = channel::<u32>(3);
    }

    #[test]
    fn test_queued_values_dropped_with_ring() {
        // Leak check by proxy: Arc payloads queued but never received must
        // still be dropped when both halves go away.
        let payload = Arc::new(());
        let (mut tx, rx) = channel::<Arc<()>>(4);
        tx.send(Arc::clone(&payload));
        tx.send(Arc::clone(&payload));
        assert_eq!(Arc::strong_count(&payload), 3);

        drop(tx);
        drop(rx);
        assert_eq!(Arc::strong_count(&payload), 1);
    }

    #[test]
    fn test_cross_thread_handoff() {
        let (mut tx, mut rx) = channel::<u32>(1024);
        let sender = std::thread::spawn(move || {
            let mut dropped = 0u32;
            for i in 0..10_000 {
                if !tx.send(i) {
                    dropped += 1;
                }
            }
            dropped
        });

        let mut last_seen: Option<u32> = None;
        let mut received = 0u32;
        loop {
            match rx.recv() {
                Some(v) => {
                    if let Some(prev) = last_seen {
                        assert!(v > prev, "out of order: {v} after {prev}");
                    }
                    last_seen = Some(v);
                    received += 1;
                }
                None => {
                    if sender.is_finished() && rx.is_empty() {
                        break;
                    }
                    std::thread::yield_now();
                }
            }
        }

        let dropped = sender.join().expect("sender thread panicked");
        assert_eq!(received + dropped, 10_000);
    }
}
