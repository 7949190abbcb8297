//! The logger's public surface: construction (with a dropping-sink
//! fallback on file-open failure), the producer-side `log` hot path, and a
//! `Drop` that drains, flushes, and joins the writer thread.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use hft_core::MpmcRing;

use crate::config::LoggerConfig;
use crate::error::LogFileError;
use crate::record::{Level, LogRecord};
use crate::timestamp;
use crate::writer::{self, Stats, WakeChannel};

/// A point-in-time snapshot of the logger's counters. All fields are
/// relaxed atomics under the hood — observational only, never used to
/// infer ordering.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggerStats {
    pub records_submitted: u64,
    pub records_written: u64,
    pub records_dropped: u64,
    pub bytes_written: u64,
    pub write_errors: u64,
}

/// An async logging pipeline: producer-side record construction over an
/// MPMC queue, and a dedicated writer thread that batches and emits them.
///
/// Construction never fails. If the log file can't be opened, the logger
/// becomes a sink that accepts every call and drops every record, counting
/// them in [`Logger::stats`] — a degraded logger is never a reason to stop
/// the rest of the process.
pub struct Logger {
    queue: Arc<MpmcRing<LogRecord>>,
    stats: Arc<Stats>,
    running: Arc<AtomicBool>,
    wake: Arc<WakeChannel>,
    writer: Option<JoinHandle<()>>,
    config: LoggerConfig,
}

impl Logger {
    /// Opens (creating parent directories as needed) or falls back to a
    /// dropping sink for, the log file at `path`, and spawns the writer
    /// thread.
    #[must_use]
    pub fn new<P: AsRef<Path>>(path: P, config: LoggerConfig) -> Self {
        let path = path.as_ref().to_path_buf();
        let file = match open_log_file(&path) {
            Ok(file) => Some(file),
            Err(err) => {
                eprintln!("hft-logger: {err}; continuing as a dropping sink");
                None
            }
        };

        let queue = Arc::new(MpmcRing::with_capacity(config.queue_capacity));
        let stats = Arc::new(Stats::default());
        let running = Arc::new(AtomicBool::new(true));
        let wake = Arc::new(WakeChannel::new());

        if let Some(mut file) = file.as_ref().and_then(|f| f.try_clone().ok()) {
            write_startup_lines(&mut file, &config);
        }

        let writer = Some(spawn_writer(
            Arc::clone(&queue),
            Arc::clone(&stats),
            Arc::clone(&running),
            Arc::clone(&wake),
            config.clone(),
            file,
        ));

        Self {
            queue,
            stats,
            running,
            wake,
            writer,
            config,
        }
    }

    /// Submits a record. Never blocks: on queue-full the record is dropped
    /// and [`Logger::stats`]'s `records_dropped` counter is incremented.
    pub fn log(&self, level: Level, message: &str) {
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        let timestamp = timestamp::monotonic_nanos();
        let thread_id = timestamp::thread_id();

        let record = if self.config.test_fastpath {
            let (sec, nanos) = timestamp::to_wall_clock(timestamp);
            let line = format!("[{sec}.{nanos:09}][{}][T{thread_id}] {message}", level.label());
            LogRecord::new_preformatted(timestamp, thread_id, level, line.as_bytes())
        } else {
            LogRecord::new(timestamp, thread_id, level, message.as_bytes())
        };

        match self.queue.enqueue(record) {
            Ok(()) => {
                if self.wake.queue_was_empty.swap(false, Ordering::AcqRel) {
                    self.wake.notify();
                }
            }
            Err(_) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }

    pub fn fatal(&self, message: &str) {
        self.log(Level::Fatal, message);
    }

    #[must_use]
    pub fn stats(&self) -> LoggerStats {
        LoggerStats {
            records_submitted: self.stats.submitted.load(Ordering::Relaxed),
            records_written: self.stats.written.load(Ordering::Relaxed),
            records_dropped: self.stats.dropped.load(Ordering::Relaxed),
            bytes_written: self.stats.bytes_written.load(Ordering::Relaxed),
            write_errors: self.stats.write_errors.load(Ordering::Relaxed),
        }
    }

    /// Signals the writer to drain, flush, and exit, then joins it.
    /// Idempotent: a second call is a no-op.
    pub fn shutdown(&mut self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        self.wake.notify();
        if let Some(handle) = self.writer.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_writer(
    queue: Arc<MpmcRing<LogRecord>>,
    stats: Arc<Stats>,
    running: Arc<AtomicBool>,
    wake: Arc<WakeChannel>,
    config: LoggerConfig,
    file: Option<File>,
) -> JoinHandle<()> {
    let writer_cpu = config.writer_cpu;
    let run = move || writer::run(queue, stats, running, wake, config, file);

    match writer_cpu {
        Some(cpu) => hft_affinity::spawn_pinned(cpu, "hft-logger-writer", run),
        None => std::thread::Builder::new()
            .name("hft-logger-writer".to_string())
            .spawn(run)
            .expect("failed to spawn logger writer thread"),
    }
}

fn write_startup_lines(file: &mut File, config: &LoggerConfig) {
    use std::io::Write;
    let writer_cpu = config
        .writer_cpu
        .map_or_else(|| "none".to_string(), |cpu| cpu.to_string());
    let _ = writeln!(
        file,
        "[LOGGER_CONFIG] queue_capacity={} batch_size={} spin_count={} flush_ms={} writer_cpu={}",
        config.queue_capacity, config.batch_size, config.spin_before_wait, config.flush_interval_ms, writer_cpu
    );
    let _ = writeln!(file, "[SELF_TEST] Logger initialization complete");
}

fn open_log_file(path: &PathBuf) -> Result<File, LogFileError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| LogFileError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LogFileError::Open {
            path: path.clone(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_logger_writes_submitted_record_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.log");
        let mut logger = Logger::new(&path, LoggerConfig::default().with_spin_before_wait(0));
        logger.info("hello world");
        logger.shutdown();

        let mut contents = String::new();
        File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        assert!(contents.contains("[LOGGER_CONFIG]"));
        assert!(contents.contains("[SELF_TEST] Logger initialization complete"));
        assert!(contents.contains("[INFO ]"));
        assert!(contents.contains("hello world"));

        let stats = logger.stats();
        assert_eq!(stats.records_submitted, 1);
        assert_eq!(stats.records_written, 1);
        assert_eq!(stats.records_dropped, 0);
    }

    #[test]
    fn test_logger_accounting_balances_after_drain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.log");
        let config = LoggerConfig::default()
            .with_queue_capacity(1024)
            .with_spin_before_wait(0);
        let mut logger = Logger::new(&path, config);

        for i in 0..4000 {
            logger.info(&format!("record {i}"));
        }
        logger.shutdown();

        let stats = logger.stats();
        assert_eq!(stats.records_written + stats.records_dropped, 4000);
    }

    #[test]
    fn test_logger_survives_unwritable_parent_path() {
        // A path under `/proc` can't have directories created in it; the
        // logger must degrade to a dropping sink rather than panicking or
        // returning an error.
        let path = PathBuf::from("/proc/self/impossible-hft-logger-dir/trades.log");
        let mut logger = Logger::new(&path, LoggerConfig::default().with_spin_before_wait(0));

        for _ in 0..10 {
            logger.info("should be dropped");
        }
        logger.shutdown();

        let stats = logger.stats();
        assert_eq!(stats.records_submitted, 10);
        assert_eq!(stats.records_dropped, 10);
        assert_eq!(stats.records_written, 0);
    }

    #[test]
    fn test_preformatted_record_emitted_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.log");
        let config = LoggerConfig::default()
            .with_spin_before_wait(0)
            .with_test_fastpath(true);
        let mut logger = Logger::new(&path, config);
        logger.warn("fastpath message");
        logger.shutdown();

        let mut contents = String::new();
        File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        assert!(contents.contains("[WARN ]"));
        assert!(contents.contains("fastpath message"));
    }
}
