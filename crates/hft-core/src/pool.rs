//! Fixed-capacity, typed block allocator.
//!
//! Storage and the free list are kept as separate arrays ("structure of
//! arrays") so that walking the free list never touches a payload cache
//! line. The free list itself is a stack of indices guarded by a short
//! spin lock — the critical section is a handful of instructions, so a
//! lock is cheaper here than the bookkeeping a lock-free tagged-pointer
//! scheme would need for a fixed-size pool.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;
use thiserror::Error;

use crate::backoff::Backoff;
use crate::debug_assert_bounded_count;

/// When a block's memory is zeroed relative to acquire/release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeroPolicy {
    /// Never zero; the caller must treat the block as uninitialized.
    #[default]
    None,
    /// Zero the block before handing it to the caller.
    OnAcquire,
    /// Zero the block when it is returned to the pool.
    OnRelease,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    #[error("failed to allocate backing region for pool of capacity {capacity}")]
    AllocationFailed { capacity: usize },
}

/// An owned reference to one block acquired from a [`MemoryPool`].
///
/// Not `Clone`: exactly one handle exists for an acquired block at a time,
/// mirroring the pool's exclusivity invariant. Dropping a handle without
/// calling [`MemoryPool::release`] leaks the block for the pool's lifetime
/// (it is never reclaimed implicitly, since the pool has no way to run
/// destructors safely from an arbitrary thread).
#[derive(Debug)]
pub struct BlockHandle<T> {
    index: usize,
    ptr: *mut T,
}

unsafe impl<T: Send> Send for BlockHandle<T> {}

impl<T> BlockHandle<T> {
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// # Safety
    /// The caller must not retain the pointer past the handle's release.
    #[must_use]
    pub unsafe fn as_ptr(&self) -> *mut T {
        self.ptr
    }
}

struct Slot<T> {
    payload: UnsafeCell<MaybeUninit<T>>,
    in_use: AtomicBool,
}

/// A fixed-capacity typed allocator with O(1) acquire/release and no
/// allocation past construction.
pub struct MemoryPool<T, const N: usize> {
    slots: Box<[Slot<T>]>,
    free_list: Box<[UnsafeCell<usize>]>,
    free_top: CachePadded<AtomicUsize>,
    lock: CachePadded<AtomicBool>,
    acquired: AtomicUsize,
    zero_policy: ZeroPolicy,
}

unsafe impl<T: Send, const N: usize> Send for MemoryPool<T, N> {}
unsafe impl<T: Send, const N: usize> Sync for MemoryPool<T, N> {}

impl<T, const N: usize> MemoryPool<T, N> {
    /// Builds a pool of `N` blocks, pre-faulting every page of the backing
    /// region so the first hot-path `acquire` never takes a page fault.
    ///
    /// # Errors
    /// Returns [`PoolError::AllocationFailed`] only if the backing
    /// allocation itself fails; this never panics mid-construction.
    pub fn new(zero_policy: ZeroPolicy) -> Result<Self, PoolError> {
        if N == 0 {
            return Err(PoolError::AllocationFailed { capacity: N });
        }

        let mut slots = Vec::with_capacity(N);
        for _ in 0..N {
            slots.push(Slot {
                payload: UnsafeCell::new(MaybeUninit::uninit()),
                in_use: AtomicBool::new(false),
            });
        }
        let slots = slots.into_boxed_slice();

        let free_list: Box<[UnsafeCell<usize>]> =
            (0..N).map(UnsafeCell::new).collect::<Vec<_>>().into_boxed_slice();

        let pool = Self {
            slots,
            free_list,
            free_top: CachePadded::new(AtomicUsize::new(N)),
            lock: CachePadded::new(AtomicBool::new(false)),
            acquired: AtomicUsize::new(0),
            zero_policy,
        };

        pool.prefault();
        Ok(pool)
    }

    /// Touches every slot once so the first real use doesn't fault.
    fn prefault(&self) {
        for slot in self.slots.iter() {
            unsafe {
                std::ptr::write_bytes((*slot.payload.get()).as_mut_ptr().cast::<u8>(), 0, 1);
            }
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        N
    }

    #[must_use]
    pub fn acquired_count(&self) -> usize {
        self.acquired.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.acquired_count() >= N
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.acquired_count() == 0
    }

    fn lock_free_list(&self) -> Backoff {
        let mut backoff = Backoff::new();
        while self
            .lock
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            backoff.spin();
        }
        backoff
    }

    fn unlock_free_list(&self) {
        self.lock.store(false, Ordering::Release);
    }

    /// Pops one block off the free list. Never blocks beyond the bounded
    /// spin on the internal lock; returns `None` once the pool is
    /// exhausted rather than waiting for a release.
    #[must_use]
    pub fn acquire(&self) -> Option<BlockHandle<T>> {
        let _backoff = self.lock_free_list();
        let top = self.free_top.load(Ordering::Relaxed);
        debug_assert_bounded_count!(top, N);
        if top == 0 {
            self.unlock_free_list();
            return None;
        }
        let new_top = top - 1;
        let index = unsafe { *self.free_list[new_top].get() };
        self.free_top.store(new_top, Ordering::Relaxed);
        self.unlock_free_list();

        let slot = &self.slots[index];
        slot.in_use.store(true, Ordering::Release);
        self.acquired.fetch_add(1, Ordering::Relaxed);

        if self.zero_policy == ZeroPolicy::OnAcquire {
            unsafe {
                std::ptr::write_bytes((*slot.payload.get()).as_mut_ptr().cast::<u8>(), 0, 1);
            }
        }

        Some(BlockHandle {
            index,
            ptr: unsafe { (*slot.payload.get()).as_mut_ptr() },
        })
    }

    /// Same as [`acquire`](Self::acquire) but unconditionally zeroes the
    /// block first, regardless of the pool's configured [`ZeroPolicy`].
    #[must_use]
    pub fn acquire_zeroed(&self) -> Option<BlockHandle<T>> {
        let handle = self.acquire()?;
        unsafe {
            std::ptr::write_bytes(handle.ptr.cast::<u8>(), 0, 1);
        }
        Some(handle)
    }

    /// Returns a block to the pool. Releasing an already-free handle, or a
    /// handle from a different pool, is a no-op rather than a fault.
    pub fn release(&self, handle: BlockHandle<T>) {
        let index = handle.index;
        if index >= self.slots.len() {
            return;
        }
        let slot = &self.slots[index];

        // Idempotent double-release: only proceed if we actually flip
        // in_use from true to false.
        if slot
            .in_use
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return;
        }

        if self.zero_policy == ZeroPolicy::OnRelease {
            unsafe {
                std::ptr::write_bytes((*slot.payload.get()).as_mut_ptr().cast::<u8>(), 0, 1);
            }
        }

        let _backoff = self.lock_free_list();
        let top = self.free_top.load(Ordering::Relaxed);
        debug_assert_bounded_count!(top, N);
        unsafe {
            *self.free_list[top].get() = index;
        }
        self.free_top.store(top + 1, Ordering::Relaxed);
        self.unlock_free_list();

        self.acquired.fetch_sub(1, Ordering::Relaxed);
    }
}
