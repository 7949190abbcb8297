//! Loom-based concurrency tests for the SPSC and MPMC rings.
//!
//! Run with: `cargo test --features loom --test loom_tests --release`
//!
//! Loom exhaustively explores thread interleavings to find ordering bugs
//! that only manifest under specific schedules. We model a simplified
//! version of each ring (small fixed capacity) to keep loom's state space
//! tractable; the production rings in `hft_core::spsc`/`hft_core::mpmc`
//! share the same synchronization protocol, just generalized to arbitrary
//! `T` and capacity.

#![cfg(feature = "loom")]

use loom::sync::atomic::{AtomicUsize, Ordering};
use loom::sync::Arc;
use loom::thread;
use std::cell::UnsafeCell;

struct LoomSpscRing {
    write: AtomicUsize,
    read: AtomicUsize,
    buffer: UnsafeCell<[u64; 4]>,
}

unsafe impl Send for LoomSpscRing {}
unsafe impl Sync for LoomSpscRing {}

impl LoomSpscRing {
    fn new() -> Self {
        Self {
            write: AtomicUsize::new(0),
            read: AtomicUsize::new(0),
            buffer: UnsafeCell::new([0; 4]),
        }
    }

    fn push(&self, value: u64) -> bool {
        let write = self.write.load(Ordering::Relaxed);
        let read = self.read.load(Ordering::Acquire);
        if write.wrapping_sub(read) >= 4 {
            return false;
        }
        unsafe {
            (*self.buffer.get())[write & 3] = value;
        }
        self.write.store(write.wrapping_add(1), Ordering::Release);
        true
    }

    fn pop(&self) -> Option<u64> {
        let read = self.read.load(Ordering::Relaxed);
        let write = self.write.load(Ordering::Acquire);
        if read == write {
            return None;
        }
        let value = unsafe { (*self.buffer.get())[read & 3] };
        self.read.store(read.wrapping_add(1), Ordering::Release);
        Some(value)
    }
}

#[test]
fn loom_spsc_happens_before() {
    loom::model(|| {
        let ring = Arc::new(LoomSpscRing::new());
        let producer_ring = Arc::clone(&ring);

        let producer = thread::spawn(move || {
            producer_ring.push(42);
            producer_ring.push(43);
        });

        let mut received = Vec::new();
        for _ in 0..10 {
            if let Some(v) = ring.pop() {
                received.push(v);
            }
            if received.len() == 2 {
                break;
            }
            loom::thread::yield_now();
        }
        producer.join().unwrap();

        if received.len() >= 2 {
            assert_eq!(received[0], 42);
            assert_eq!(received[1], 43);
        }
    });
}

#[test]
fn loom_spsc_full_ring_then_drain() {
    loom::model(|| {
        let ring = Arc::new(LoomSpscRing::new());
        assert!(ring.push(1));
        assert!(ring.push(2));
        assert!(ring.push(3));
        assert!(ring.push(4));
        assert!(!ring.push(5));

        let consumer_ring = Arc::clone(&ring);
        let consumer = thread::spawn(move || consumer_ring.pop());
        let value = consumer.join().unwrap();
        assert_eq!(value, Some(1));

        assert!(ring.push(5));
    });
}

struct LoomCell {
    sequence: AtomicUsize,
    value: UnsafeCell<Option<u64>>,
}

unsafe impl Send for LoomCell {}
unsafe impl Sync for LoomCell {}

struct LoomMpmcRing {
    head: AtomicUsize,
    tail: AtomicUsize,
    cells: [LoomCell; 2],
}

unsafe impl Send for LoomMpmcRing {}
unsafe impl Sync for LoomMpmcRing {}

impl LoomMpmcRing {
    fn new() -> Self {
        Self {
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            cells: [
                LoomCell {
                    sequence: AtomicUsize::new(0),
                    value: UnsafeCell::new(None),
                },
                LoomCell {
                    sequence: AtomicUsize::new(1),
                    value: UnsafeCell::new(None),
                },
            ],
        }
    }

    fn enqueue(&self, value: u64) -> bool {
        let mut pos = self.tail.load(Ordering::Relaxed);
        loop {
            let cell = &self.cells[pos & 1];
            let seq = cell.sequence.load(Ordering::Acquire);
            let diff = seq as isize - pos as isize;
            if diff == 0 {
                if self
                    .tail
                    .compare_exchange_weak(pos, pos + 1, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
                {
                    unsafe {
                        *cell.value.get() = Some(value);
                    }
                    cell.sequence.store(pos + 1, Ordering::Release);
                    return true;
                }
            } else if diff < 0 {
                return false;
            } else {
                pos = self.tail.load(Ordering::Relaxed);
            }
        }
    }

    fn dequeue(&self) -> Option<u64> {
        let mut pos = self.head.load(Ordering::Relaxed);
        loop {
            let cell = &self.cells[pos & 1];
            let seq = cell.sequence.load(Ordering::Acquire);
            let diff = seq as isize - (pos + 1) as isize;
            if diff == 0 {
                if self
                    .head
                    .compare_exchange_weak(pos, pos + 1, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
                {
                    let value = unsafe { (*cell.value.get()).take() };
                    cell.sequence.store(pos + 2, Ordering::Release);
                    return value;
                }
            } else if diff < 0 {
                return None;
            } else {
                pos = self.head.load(Ordering::Relaxed);
            }
        }
    }
}

#[test]
fn loom_mpmc_two_producers_one_slot_each() {
    loom::model(|| {
        let ring = Arc::new(LoomMpmcRing::new());
        let r1 = Arc::clone(&ring);
        let r2 = Arc::clone(&ring);

        let p1 = thread::spawn(move || r1.enqueue(1));
        let p2 = thread::spawn(move || r2.enqueue(2));

        let ok1 = p1.join().unwrap();
        let ok2 = p2.join().unwrap();
        assert!(ok1 && ok2, "ring has room for exactly two producers");

        let mut seen = vec![];
        while let Some(v) = ring.dequeue() {
            seen.push(v);
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2]);
    });
}
