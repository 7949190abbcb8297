//! Single-producer/single-consumer bounded ring.
//!
//! The producer and consumer indices live on distinct cache lines, and each
//! side keeps a cached copy of the other side's index so that the common
//! case (room to write / data to read) never has to cross a cache line to
//! find out. This is the same layout the MPMC ring in [`crate::mpmc`] uses
//! for its head/tail pair, just specialized to exactly one writer and one
//! reader.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

use crate::{
    debug_assert_bounded_count, debug_assert_head_not_past_tail, debug_assert_initialized_read,
    debug_assert_monotonic, debug_assert_no_wrap,
};

const fn assert_power_of_two(n: usize) {
    assert!(n > 0 && n & (n - 1) == 0, "capacity must be a power of two");
}

/// A fixed-capacity SPSC ring. `N` must be a power of two.
///
/// Safety contract: exactly one thread may call the `*_write` methods for
/// the ring's lifetime, and exactly one (possibly different) thread may
/// call the `*_read` methods. Violating this is undefined behavior — the
/// ring performs no runtime check for it, matching the zero-overhead
/// single-writer/single-reader contract the algorithm depends on.
#[repr(C)]
pub struct SpscRing<T, const N: usize> {
    write: CachePadded<AtomicUsize>,
    cached_read: CachePadded<UnsafeCell<usize>>,
    read: CachePadded<AtomicUsize>,
    cached_write: CachePadded<UnsafeCell<usize>>,
    count: CachePadded<AtomicUsize>,
    buffer: Box<[UnsafeCell<MaybeUninit<T>>]>,
}

unsafe impl<T: Send, const N: usize> Send for SpscRing<T, N> {}
unsafe impl<T: Send, const N: usize> Sync for SpscRing<T, N> {}

impl<T, const N: usize> SpscRing<T, N> {
    #[must_use]
    pub fn new() -> Self {
        assert_power_of_two(N);
        let buffer = (0..N)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            write: CachePadded::new(AtomicUsize::new(0)),
            cached_read: CachePadded::new(UnsafeCell::new(0)),
            read: CachePadded::new(AtomicUsize::new(0)),
            cached_write: CachePadded::new(UnsafeCell::new(0)),
            count: CachePadded::new(AtomicUsize::new(0)),
            buffer,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        N
    }

    fn mask(&self) -> usize {
        N - 1
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len() == N
    }

    /// Producer-only: returns a writable slot if there is room, without
    /// publishing it. Call [`commit_write`](Self::commit_write) to publish.
    pub fn reserve_write(&self) -> Option<*mut T> {
        let write = self.write.load(Ordering::Relaxed);
        let cached_read = unsafe { *self.cached_read.get() };
        if write.wrapping_sub(cached_read) >= N {
            // Cached view says full; refresh from the real read index. The
            // consumer can never have read past what this (sole) producer
            // has published, so the freshly observed index must not be
            // ahead of our own.
            let read = self.read.load(Ordering::Acquire);
            debug_assert_head_not_past_tail!(read, write);
            unsafe {
                *self.cached_read.get() = read;
            }
            if write.wrapping_sub(read) >= N {
                return None;
            }
        }
        let slot = &self.buffer[write & self.mask()];
        Some(unsafe { (*slot.get()).as_mut_ptr() })
    }

    /// Producer-only: publishes the most recently reserved slot.
    pub fn commit_write(&self) {
        let write = self.write.load(Ordering::Relaxed);
        let next = write.wrapping_add(1);
        debug_assert_monotonic!(write, next);
        self.write.store(next, Ordering::Release);
        #[cfg(debug_assertions)]
        {
            let observed = self.write.load(Ordering::Relaxed);
            debug_assert_no_wrap!(write, observed, 1);
        }
        let new_count = self.count.fetch_add(1, Ordering::Release) + 1;
        debug_assert_bounded_count!(new_count, N);
    }

    /// Consumer-only: returns the next readable slot without consuming it.
    pub fn peek_read(&self) -> Option<*const T> {
        let read = self.read.load(Ordering::Relaxed);
        let cached_write = unsafe { *self.cached_write.get() };
        let write = if read == cached_write {
            // Cached view says empty; refresh from the real write index.
            // The producer is the sole writer of `write`, so a freshly
            // observed value can never trail our own committed read index.
            let write = self.write.load(Ordering::Acquire);
            debug_assert_head_not_past_tail!(read, write);
            unsafe {
                *self.cached_write.get() = write;
            }
            write
        } else {
            cached_write
        };
        if read == write {
            return None;
        }
        debug_assert_initialized_read!(read != write);
        let slot = &self.buffer[read & self.mask()];
        Some(unsafe { (*slot.get()).as_ptr() })
    }

    /// Consumer-only: advances past the slot returned by
    /// [`peek_read`](Self::peek_read).
    pub fn commit_read(&self) {
        let read = self.read.load(Ordering::Relaxed);
        let next = read.wrapping_add(1);
        debug_assert_monotonic!(read, next);
        self.read.store(next, Ordering::Release);
        #[cfg(debug_assertions)]
        {
            let observed = self.read.load(Ordering::Relaxed);
            debug_assert_no_wrap!(read, observed, 1);
        }
        let prev = self.count.fetch_sub(1, Ordering::Release);
        debug_assert!(prev > 0, "commit_read on an empty ring");
    }

    /// Convenience wrapper: copies `value` into the ring if there is room.
    pub fn push(&self, value: T) -> Result<(), T> {
        match self.reserve_write() {
            Some(ptr) => {
                unsafe {
                    ptr.write(value);
                }
                self.commit_write();
                Ok(())
            }
            None => Err(value),
        }
    }

    /// Convenience wrapper: reads and removes the next value, if any.
    pub fn recv(&self) -> Option<T> {
        let ptr = self.peek_read()?;
        let value = unsafe { ptr.read() };
        self.commit_read();
        Some(value)
    }
}

impl<T, const N: usize> Default for SpscRing<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Drop for SpscRing<T, N> {
    fn drop(&mut self) {
        while self.recv().is_some() {}
    }
}
