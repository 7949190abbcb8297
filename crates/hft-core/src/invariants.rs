//! Debug-only assertions for the ring and pool implementations.
//!
//! Every macro here compiles to nothing in release builds. They exist so the
//! lock-free algorithms in this crate fail loudly in debug/test builds the
//! moment a supposed invariant breaks, rather than silently corrupting state
//! that only shows up as a bogus trade three hops downstream.

/// Asserts a count never exceeds its declared capacity.
#[macro_export]
macro_rules! debug_assert_bounded_count {
    ($count:expr, $capacity:expr) => {
        #[cfg(debug_assertions)]
        {
            let count = $count;
            let capacity = $capacity;
            debug_assert!(
                count <= capacity,
                "count {} exceeds capacity {}",
                count,
                capacity
            );
        }
    };
}

/// Asserts the producer-visible index never runs behind the consumer index.
#[macro_export]
macro_rules! debug_assert_head_not_past_tail {
    ($head:expr, $tail:expr) => {
        #[cfg(debug_assertions)]
        {
            let head = $head;
            let tail = $tail;
            debug_assert!(
                head <= tail,
                "head {} moved past tail {}",
                head,
                tail
            );
        }
    };
}

/// Asserts an index only ever moves forward.
#[macro_export]
macro_rules! debug_assert_monotonic {
    ($prev:expr, $next:expr) => {
        #[cfg(debug_assertions)]
        {
            let prev = $prev;
            let next = $next;
            debug_assert!(
                next >= prev,
                "index regressed from {} to {}",
                prev,
                next
            );
        }
    };
}

/// Asserts advancing an index by `n` did not wrap the underlying counter.
#[macro_export]
macro_rules! debug_assert_no_wrap {
    ($before:expr, $after:expr, $n:expr) => {
        #[cfg(debug_assertions)]
        {
            let before = $before;
            let after = $after;
            let n = $n;
            debug_assert!(
                after == before.wrapping_add(n),
                "index advance wrapped: before={} n={} after={}",
                before,
                n,
                after
            );
        }
    };
}

/// Asserts a slot claimed for a read was actually published by a writer.
#[macro_export]
macro_rules! debug_assert_initialized_read {
    ($condition:expr) => {
        #[cfg(debug_assertions)]
        {
            debug_assert!($condition, "read of a slot that was never committed");
        }
    };
}
