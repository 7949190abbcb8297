//! CPU pinning and NUMA locality preference for the current thread, plus a
//! helper to spawn an already-pinned thread without a sleep-based
//! readiness check.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use crate::error::AffinityError;

/// Pins the calling thread to a single CPU core.
///
/// Returns `Ok(())` on success, or [`AffinityError::PinRefused`] if the OS
/// rejects the request (invalid CPU index, insufficient privilege). Never
/// panics.
#[cfg(target_os = "linux")]
pub fn pin_to_cpu(cpu: usize) -> Result<(), AffinityError> {
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(cpu, &mut set);
        let rc = libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set);
        if rc == 0 {
            Ok(())
        } else {
            Err(AffinityError::PinRefused { cpu })
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub fn pin_to_cpu(cpu: usize) -> Result<(), AffinityError> {
    let _ = cpu;
    Err(AffinityError::PinRefused { cpu })
}

/// Requests that future allocations on the calling thread prefer the given
/// NUMA node. Requires the `numa` feature and a Linux target; everywhere
/// else this is a documented no-op that returns
/// [`AffinityError::NumaUnavailable`].
#[cfg(all(target_os = "linux", feature = "numa"))]
pub fn prefer_numa_node(node: usize) -> Result<(), AffinityError> {
    const MPOL_PREFERRED: libc::c_ulong = 1;
    // mbind(addr=NULL, len=0, ...) sets the calling thread's default
    // policy rather than binding a specific mapping; there is no libc
    // wrapper for mbind, so this goes through a raw syscall.
    let nodemask: libc::c_ulong = 1u64.checked_shl(node as u32).unwrap_or(0) as libc::c_ulong;
    if nodemask == 0 {
        return Err(AffinityError::NumaUnavailable { node });
    }
    let rc = unsafe {
        libc::syscall(
            libc::SYS_mbind,
            std::ptr::null::<u8>(),
            0usize,
            MPOL_PREFERRED,
            &nodemask as *const libc::c_ulong,
            (node + 1) as libc::c_ulong,
            0u32,
        )
    };
    if rc == 0 {
        Ok(())
    } else {
        Err(AffinityError::NumaUnavailable { node })
    }
}

#[cfg(not(all(target_os = "linux", feature = "numa")))]
pub fn prefer_numa_node(node: usize) -> Result<(), AffinityError> {
    Err(AffinityError::NumaUnavailable { node })
}

/// Spawns a thread that pins itself to `cpu`, names itself (truncated to
/// 15 bytes, the OS thread-name limit on Linux), and only returns to the
/// caller once that setup has actually happened — no sleep-based polling.
pub fn spawn_pinned<F, T>(cpu: usize, name: &str, f: F) -> JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let ready = Arc::new((Mutex::new(false), Condvar::new()));
    let ready_for_thread = Arc::clone(&ready);
    let name = truncate_thread_name(name);
    let name_for_thread = name.clone();

    let builder = thread::Builder::new().name(name.clone());
    let handle = builder
        .spawn(move || {
            if let Err(err) = pin_to_cpu(cpu) {
                eprintln!("hft-affinity: {name_for_thread}: {err}; continuing unpinned");
            }
            {
                let (lock, cvar) = &*ready_for_thread;
                let mut done = lock.lock().unwrap();
                *done = true;
                cvar.notify_all();
            }
            f()
        })
        .expect("failed to spawn OS thread");

    let (lock, cvar) = &*ready;
    let mut done = lock.lock().unwrap();
    while !*done {
        done = cvar.wait(done).unwrap();
    }

    handle
}

fn truncate_thread_name(name: &str) -> String {
    if name.len() <= 15 {
        name.to_string()
    } else {
        name.chars().take(15).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_pinned_runs_closure_after_signaling_ready() {
        let handle = spawn_pinned(0, "very-long-thread-name-exceeding-limit", || 7);
        assert_eq!(handle.join().unwrap(), 7);
    }

    #[test]
    fn test_truncate_thread_name_respects_os_limit() {
        assert_eq!(truncate_thread_name("short"), "short");
        assert_eq!(truncate_thread_name("0123456789abcdefgh").len(), 15);
    }
}
