//! Bounded multi-producer/multi-consumer ring, Vyukov's sequenced-cell
//! algorithm.
//!
//! Each cell carries its own sequence counter. The relationship between a
//! cell's sequence and the producer/consumer position attempting to touch
//! it tells that thread whether the cell is free to claim, already claimed
//! by someone else, or not yet recycled for another lap around the ring.
//! Unlike the SPSC ring, both `head` and `tail` are contended by multiple
//! threads, so every step goes through a CAS rather than a single owner's
//! relaxed store.
//!
//! Capacity is chosen at construction time (and rounded up to the next
//! power of two) rather than fixed at compile time, since the logger needs
//! to size its queue from an environment variable.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

struct Cell<T> {
    sequence: AtomicUsize,
    value: UnsafeCell<Option<T>>,
}

unsafe impl<T: Send> Send for Cell<T> {}
unsafe impl<T: Send> Sync for Cell<T> {}

/// A bounded MPMC ring whose capacity is a power of two fixed at
/// construction.
#[repr(C)]
pub struct MpmcRing<T> {
    head: CachePadded<AtomicUsize>,
    tail: CachePadded<AtomicUsize>,
    mask: usize,
    cells: Box<[CachePadded<Cell<T>>]>,
}

unsafe impl<T: Send> Send for MpmcRing<T> {}
unsafe impl<T: Send> Sync for MpmcRing<T> {}

impl<T> MpmcRing<T> {
    /// Builds a ring holding at least `capacity` elements, rounding up to
    /// the next power of two (minimum 2). Pre-touches every cell so the
    /// first hot-path enqueue never faults.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = if capacity < 2 {
            2
        } else {
            capacity.next_power_of_two()
        };
        let cells = (0..capacity)
            .map(|i| {
                CachePadded::new(Cell {
                    sequence: AtomicUsize::new(i),
                    value: UnsafeCell::new(None),
                })
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let ring = Self {
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            mask: capacity - 1,
            cells,
        };
        ring.prefault();
        ring
    }

    fn prefault(&self) {
        for cell in self.cells.iter() {
            let _ = cell.sequence.load(Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Approximate; a concurrent enqueue/dequeue can invalidate the answer
    /// immediately after it is returned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        head == tail
    }

    /// Attempts to enqueue `value`. Returns it back on failure (queue at
    /// capacity) rather than blocking.
    pub fn enqueue(&self, value: T) -> Result<(), T> {
        let mask = self.mask;
        let mut pos = self.tail.load(Ordering::Relaxed);
        loop {
            let cell = &self.cells[pos & mask];
            let seq = cell.sequence.load(Ordering::Acquire);
            let diff = seq as isize - pos as isize;

            if diff == 0 {
                match self.tail.compare_exchange_weak(
                    pos,
                    pos + 1,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        unsafe {
                            *cell.value.get() = Some(value);
                        }
                        cell.sequence.store(pos + 1, Ordering::Release);
                        return Ok(());
                    }
                    Err(actual) => pos = actual,
                }
            } else if diff < 0 {
                return Err(value);
            } else {
                pos = self.tail.load(Ordering::Relaxed);
            }
        }
    }

    /// Attempts to dequeue the oldest value. Returns `None` if the queue
    /// is empty rather than blocking.
    pub fn dequeue(&self) -> Option<T> {
        let mask = self.mask;
        let mut pos = self.head.load(Ordering::Relaxed);
        loop {
            let cell = &self.cells[pos & mask];
            let seq = cell.sequence.load(Ordering::Acquire);
            let diff = seq as isize - (pos + 1) as isize;

            if diff == 0 {
                match self.head.compare_exchange_weak(
                    pos,
                    pos + 1,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        let value = unsafe { (*cell.value.get()).take() };
                        cell.sequence.store(pos + mask + 1, Ordering::Release);
                        return value;
                    }
                    Err(actual) => pos = actual,
                }
            } else if diff < 0 {
                return None;
            } else {
                pos = self.head.load(Ordering::Relaxed);
            }
        }
    }
}

impl<T> Drop for MpmcRing<T> {
    fn drop(&mut self) {
        while self.dequeue().is_some() {}
    }
}
