//! The writer thread: adaptive wait, batched drain, header rendering, and
//! gathered (or sequential-fallback) I/O.
//!
//! This is the only thread that ever touches the log file descriptor,
//! matching the ownership rule in the design notes ("file descriptors are
//! mutated only by their owning thread").

use std::fs::File;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

use hft_core::MpmcRing;

use crate::config::{LoggerConfig, FLUSH_BATCH_THRESHOLD};
use crate::record::LogRecord;
use crate::timestamp;

const PREFIX_CACHE_CAPACITY: usize = 64;
const WRITEV_MAX_IOVECS: usize = 1024;

#[derive(Debug, Default)]
pub(crate) struct Stats {
    pub submitted: AtomicU64,
    pub written: AtomicU64,
    pub dropped: AtomicU64,
    pub bytes_written: AtomicU64,
    pub write_errors: AtomicU64,
}

/// Shared wake channel the producer side uses to nudge the writer out of
/// its condvar wait on an empty-to-non-empty transition.
pub(crate) struct WakeChannel {
    pub mutex: Mutex<()>,
    pub condvar: Condvar,
    /// Set by the writer whenever it observes the queue empty; cleared by
    /// whichever producer's enqueue first makes it non-empty again, which
    /// is the only producer that then needs to pay for a `notify_one`.
    pub queue_was_empty: AtomicBool,
}

impl WakeChannel {
    pub fn new() -> Self {
        Self {
            mutex: Mutex::new(()),
            condvar: Condvar::new(),
            queue_was_empty: AtomicBool::new(true),
        }
    }

    pub fn notify(&self) {
        let _guard = self.mutex.lock().unwrap();
        self.condvar.notify_one();
    }
}

/// A small fixed-capacity cache from thread id to its rendered `Ttid`
/// prefix, so the common case of one thread logging repeatedly doesn't pay
/// for `format!` on every record.
struct ThreadPrefixCache {
    entries: Vec<(u32, String)>,
}

impl ThreadPrefixCache {
    fn new() -> Self {
        Self {
            entries: Vec::with_capacity(PREFIX_CACHE_CAPACITY),
        }
    }

    fn prefix_for(&mut self, tid: u32) -> &str {
        if let Some(pos) = self.entries.iter().position(|(id, _)| *id == tid) {
            return &self.entries[pos].1;
        }
        if self.entries.len() >= PREFIX_CACHE_CAPACITY {
            self.entries.remove(0);
        }
        self.entries.push((tid, format!("T{tid}")));
        &self.entries.last().unwrap().1
    }
}

fn format_header(cache: &mut ThreadPrefixCache, record: &LogRecord) -> String {
    if record.preformatted {
        return String::new();
    }
    let (sec, nanos) = timestamp::to_wall_clock(record.timestamp_nanos);
    let prefix = cache.prefix_for(record.thread_id);
    format!("[{sec}.{nanos:09}][{}][{prefix}] ", record.level.label())
}

/// The writer thread's main loop. Runs until `running` is false and the
/// queue has been drained, then flushes and returns (dropping `file`,
/// which closes the descriptor).
pub(crate) fn run(
    queue: Arc<MpmcRing<LogRecord>>,
    stats: Arc<Stats>,
    running: Arc<AtomicBool>,
    wake: Arc<WakeChannel>,
    config: LoggerConfig,
    mut file: Option<File>,
) {
    let mut prefix_cache = ThreadPrefixCache::new();
    let mut since_flush = 0usize;
    let mut last_flush = Instant::now();
    let flush_interval = Duration::from_millis(config.flush_interval_ms);

    loop {
        if !wait_for_work(&queue, &running, &wake, config.spin_before_wait) {
            break;
        }

        let batch = drain_batch(&queue, config.batch_size);
        if !batch.is_empty() {
            write_batch(&mut file, &mut prefix_cache, &batch, &stats);
            since_flush += batch.len();
        }

        maybe_flush(
            &mut file,
            queue.is_empty(),
            &mut since_flush,
            &mut last_flush,
            flush_interval,
        );
    }

    // Final drain: a shutdown race can leave a handful of records the
    // adaptive wait never got a chance to see.
    loop {
        let batch = drain_batch(&queue, config.batch_size);
        if batch.is_empty() {
            break;
        }
        write_batch(&mut file, &mut prefix_cache, &batch, &stats);
    }
    if let Some(f) = file.as_mut() {
        let _ = f.sync_data();
    }
}

/// Spins up to `spin_before_wait` times checking for work, then blocks on
/// the wake condvar with a short timeout. Returns `false` once shutdown has
/// been requested and the queue is confirmed empty.
fn wait_for_work(
    queue: &MpmcRing<LogRecord>,
    running: &AtomicBool,
    wake: &WakeChannel,
    spin_before_wait: usize,
) -> bool {
    let mut spins = 0usize;
    loop {
        if !queue.is_empty() {
            return true;
        }
        wake.queue_was_empty.store(true, Ordering::Relaxed);
        if !running.load(Ordering::Acquire) {
            return false;
        }
        if spins < spin_before_wait {
            std::hint::spin_loop();
            spins += 1;
            continue;
        }
        let guard = wake.mutex.lock().unwrap();
        let _ = wake.condvar.wait_timeout(guard, Duration::from_millis(1));
        spins = 0;
    }
}

fn drain_batch(queue: &MpmcRing<LogRecord>, batch_size: usize) -> Vec<LogRecord> {
    let mut batch = Vec::with_capacity(batch_size.min(crate::config::MAX_BATCH_SIZE));
    while batch.len() < batch_size {
        match queue.dequeue() {
            Some(record) => batch.push(record),
            None => break,
        }
    }
    batch
}

fn maybe_flush(
    file: &mut Option<File>,
    queue_now_empty: bool,
    since_flush: &mut usize,
    last_flush: &mut Instant,
    flush_interval: Duration,
) {
    let flush_due =
        queue_now_empty || *since_flush >= FLUSH_BATCH_THRESHOLD || last_flush.elapsed() >= flush_interval;
    if flush_due {
        if let Some(f) = file.as_mut() {
            let _ = f.sync_data();
        }
        *since_flush = 0;
        *last_flush = Instant::now();
    }
}

fn write_batch(
    file: &mut Option<File>,
    prefix_cache: &mut ThreadPrefixCache,
    batch: &[LogRecord],
    stats: &Stats,
) {
    let Some(f) = file.as_mut() else {
        stats.dropped.fetch_add(batch.len() as u64, Ordering::Relaxed);
        return;
    };

    let headers: Vec<String> = batch
        .iter()
        .map(|record| format_header(prefix_cache, record))
        .collect();

    #[cfg(unix)]
    {
        let is_regular_file = f.metadata().map(|m| m.is_file()).unwrap_or(false);
        if is_regular_file {
            let mut bufs: Vec<&[u8]> = Vec::with_capacity(batch.len() * 3);
            for (header, record) in headers.iter().zip(batch) {
                bufs.push(header.as_bytes());
                bufs.push(record.payload());
                bufs.push(b"\n");
            }
            match writev_all(f.as_raw_fd(), &bufs) {
                Ok(bytes) => {
                    stats.written.fetch_add(batch.len() as u64, Ordering::Relaxed);
                    stats.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
                    return;
                }
                Err(_) => {
                    stats.write_errors.fetch_add(1, Ordering::Relaxed);
                    // Fall through to the per-record fallback below.
                }
            }
        }
    }

    write_sequential(f, &headers, batch, stats);
}

fn write_sequential(f: &mut File, headers: &[String], batch: &[LogRecord], stats: &Stats) {
    for (header, record) in headers.iter().zip(batch) {
        let parts: [&[u8]; 3] = [header.as_bytes(), record.payload(), b"\n"];
        let mut bytes = 0usize;
        let mut failed = false;
        for part in parts {
            match f.write_all(part) {
                Ok(()) => bytes += part.len(),
                Err(_) => {
                    failed = true;
                    break;
                }
            }
        }
        if failed {
            stats.write_errors.fetch_add(1, Ordering::Relaxed);
            stats.dropped.fetch_add(1, Ordering::Relaxed);
        } else {
            stats.written.fetch_add(1, Ordering::Relaxed);
            stats.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
        }
    }
}

/// Issues one or more `writev(2)` calls covering every buffer in `bufs`,
/// chunked so no single call exceeds the platform's `IOV_MAX`, and looping
/// within a chunk to handle a short write that lands partway through a
/// buffer.
#[cfg(unix)]
fn writev_all(fd: std::os::unix::io::RawFd, bufs: &[&[u8]]) -> std::io::Result<usize> {
    let mut total = 0usize;
    let mut start = 0usize;
    while start < bufs.len() {
        let end = (start + WRITEV_MAX_IOVECS).min(bufs.len());
        total += writev_chunk(fd, &bufs[start..end])?;
        start = end;
    }
    Ok(total)
}

#[cfg(unix)]
fn writev_chunk(fd: std::os::unix::io::RawFd, bufs: &[&[u8]]) -> std::io::Result<usize> {
    let mut remaining: Vec<&[u8]> = bufs.to_vec();
    let mut total = 0usize;

    while !remaining.is_empty() {
        let iovecs: Vec<libc::iovec> = remaining
            .iter()
            .map(|b| libc::iovec {
                iov_base: b.as_ptr() as *mut libc::c_void,
                iov_len: b.len(),
            })
            .collect();

        let rc = unsafe { libc::writev(fd, iovecs.as_ptr(), iovecs.len() as libc::c_int) };
        if rc < 0 {
            return Err(std::io::Error::last_os_error());
        }
        let mut written = rc as usize;
        total += written;

        while written > 0 {
            if remaining[0].len() <= written {
                written -= remaining[0].len();
                remaining.remove(0);
            } else {
                remaining[0] = &remaining[0][written..];
                written = 0;
            }
        }
    }

    Ok(total)
}
