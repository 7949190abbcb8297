//! Monotonic nanosecond timestamps and a stable per-thread identifier —
//! the two external boundaries the logger's hot path depends on.
//!
//! Both are cheap: `Instant::now()` is a single `clock_gettime` on Linux,
//! and the thread id is computed once per thread and cached in a
//! thread-local.

use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

static PROCESS_START: OnceLock<(Instant, u64)> = OnceLock::new();

fn process_start() -> &'static (Instant, u64) {
    PROCESS_START.get_or_init(|| {
        let wall_nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        (Instant::now(), wall_nanos)
    })
}

/// Nanoseconds since an arbitrary process-local epoch. Monotonic, allocation-
/// free, and never blocks — safe to call on every hot-path log.
#[must_use]
pub fn monotonic_nanos() -> u64 {
    let (start, _) = process_start();
    start.elapsed().as_nanos() as u64
}

/// Converts a value returned by [`monotonic_nanos`] back to `(seconds,
/// nanoseconds)` since the Unix epoch, for rendering the log-line header.
#[must_use]
pub fn to_wall_clock(mono_nanos: u64) -> (u64, u32) {
    let (_, wall0) = process_start();
    let wall = wall0.saturating_add(mono_nanos);
    (wall / 1_000_000_000, (wall % 1_000_000_000) as u32)
}

/// A thread identifier stable for the lifetime of the calling thread.
#[cfg(target_os = "linux")]
#[must_use]
pub fn thread_id() -> u32 {
    thread_local! {
        static TID: u32 = unsafe { libc::syscall(libc::SYS_gettid) as u32 };
    }
    TID.with(|tid| *tid)
}

#[cfg(not(target_os = "linux"))]
#[must_use]
pub fn thread_id() -> u32 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    thread_local! {
        static TID: u32 = {
            let mut hasher = DefaultHasher::new();
            std::thread::current().id().hash(&mut hasher);
            hasher.finish() as u32
        };
    }
    TID.with(|tid| *tid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_nanos_is_non_decreasing() {
        let a = monotonic_nanos();
        let b = monotonic_nanos();
        assert!(b >= a);
    }

    #[test]
    fn test_thread_id_stable_within_a_thread() {
        assert_eq!(thread_id(), thread_id());
    }

    #[test]
    fn test_thread_id_differs_across_threads() {
        let a = thread_id();
        let b = std::thread::spawn(thread_id).join().unwrap();
        // Not a hard guarantee on every platform/allocator, but true in
        // practice and worth catching a regression to a constant value.
        assert_ne!(a, b);
    }

    #[test]
    fn test_wall_clock_conversion_is_plausible() {
        let (sec, nanos) = to_wall_clock(monotonic_nanos());
        // Should land somewhere after 2020-01-01 and before a generous
        // future bound, sanity-checking the epoch arithmetic.
        assert!(sec > 1_577_836_800);
        assert!(nanos < 1_000_000_000);
    }
}
