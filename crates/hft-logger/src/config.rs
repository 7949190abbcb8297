//! Env-driven logger configuration, mirroring the reference stream crate's
//! `StreamConfig` builder: a `Default` impl, named presets, and `with_*`
//! setters, plus a `from_env()` constructor so every knob in this crate's
//! environment-variable table can also be set programmatically.
//!
//! Every setter clamps silently to the nearest valid value rather than
//! rejecting the caller; the post-clamp value is what ends up in the
//! `[LOGGER_CONFIG]` startup line.

use std::env;

pub const DEFAULT_QUEUE_CAPACITY: usize = 16_384;
pub const MAX_QUEUE_CAPACITY: usize = 65_536;
pub const MIN_QUEUE_CAPACITY: usize = 2;

pub const DEFAULT_SPIN_BEFORE_WAIT: usize = 500;

pub const DEFAULT_BATCH_SIZE: usize = 128;
pub const MAX_BATCH_SIZE: usize = 1024;
pub const MIN_BATCH_SIZE: usize = 1;

pub const DEFAULT_FLUSH_MS: u64 = 100;
pub const MAX_FLUSH_MS: u64 = 10_000;
pub const MIN_FLUSH_MS: u64 = 1;

/// The writer's flush-policy batch-counter threshold (`F` in the design
/// notes). Fixed, not environment-configurable.
pub const FLUSH_BATCH_THRESHOLD: usize = 100;

/// Env-driven configuration for a [`crate::Logger`]. Every field has a
/// default; out-of-range environment values are clamped, never rejected.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub queue_capacity: usize,
    pub spin_before_wait: usize,
    pub batch_size: usize,
    pub flush_interval_ms: u64,
    pub writer_cpu: Option<usize>,
    pub test_fastpath: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            spin_before_wait: DEFAULT_SPIN_BEFORE_WAIT,
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval_ms: DEFAULT_FLUSH_MS,
            writer_cpu: None,
            test_fastpath: false,
        }
    }
}

impl LoggerConfig {
    /// Builds a config from `LOGGER_*` environment variables, falling back
    /// to defaults for anything unset or unparseable. See the crate's
    /// module docs for the full variable table.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default().with_queue_capacity(DEFAULT_QUEUE_CAPACITY);

        if let Some(v) = env_usize("LOGGER_QUEUE_CAPACITY") {
            config = config.with_queue_capacity(v);
        }
        if let Some(v) = env_usize("LOGGER_SPIN_BEFORE_WAIT") {
            config = config.with_spin_before_wait(v);
        }
        if let Some(v) = env_usize("LOGGER_BATCH") {
            config = config.with_batch_size(v);
        }
        if let Some(v) = env_u64("LOGGER_FLUSH_MS") {
            config = config.with_flush_interval_ms(v);
        }
        if let Some(v) = env_usize("LOGGER_WRITER_CPU") {
            config = config.with_writer_cpu(Some(v));
        }
        if env::var("LOGGER_TEST_FASTPATH").as_deref() == Ok("1") {
            config = config.with_test_fastpath(true);
        }

        config
    }

    /// A smaller queue and batch, shorter flush interval — trades
    /// throughput for minimizing the time a record sits unwritten.
    #[must_use]
    pub fn low_latency() -> Self {
        Self::default()
            .with_queue_capacity(4_096)
            .with_batch_size(32)
            .with_flush_interval_ms(10)
    }

    /// A larger queue and batch, longer flush interval — trades latency
    /// for fewer, bigger I/O operations.
    #[must_use]
    pub fn high_throughput() -> Self {
        Self::default()
            .with_queue_capacity(MAX_QUEUE_CAPACITY)
            .with_batch_size(MAX_BATCH_SIZE)
            .with_flush_interval_ms(500)
    }

    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity
            .max(MIN_QUEUE_CAPACITY)
            .min(MAX_QUEUE_CAPACITY)
            .next_power_of_two();
        self
    }

    #[must_use]
    pub fn with_spin_before_wait(mut self, spins: usize) -> Self {
        self.spin_before_wait = spins;
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(MIN_BATCH_SIZE).min(MAX_BATCH_SIZE);
        self
    }

    #[must_use]
    pub fn with_flush_interval_ms(mut self, flush_ms: u64) -> Self {
        self.flush_interval_ms = flush_ms.max(MIN_FLUSH_MS).min(MAX_FLUSH_MS);
        self
    }

    /// Sets the writer's target CPU. Clamped to `None` (no pinning) if the
    /// index is not less than the number of CPUs this process can see.
    #[must_use]
    pub fn with_writer_cpu(mut self, cpu: Option<usize>) -> Self {
        self.writer_cpu = cpu.filter(|&c| c < available_cpus());
        self
    }

    #[must_use]
    pub fn with_test_fastpath(mut self, enabled: bool) -> Self {
        self.test_fastpath = enabled;
        self
    }
}

#[must_use]
pub(crate) fn available_cpus() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

fn env_usize(key: &str) -> Option<usize> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_documented_defaults() {
        let config = LoggerConfig::default();
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.spin_before_wait, DEFAULT_SPIN_BEFORE_WAIT);
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.flush_interval_ms, DEFAULT_FLUSH_MS);
        assert_eq!(config.writer_cpu, None);
    }

    #[test]
    fn test_queue_capacity_clamps_and_rounds_to_power_of_two() {
        let config = LoggerConfig::default().with_queue_capacity(100_000);
        assert_eq!(config.queue_capacity, MAX_QUEUE_CAPACITY);

        let config = LoggerConfig::default().with_queue_capacity(5);
        assert_eq!(config.queue_capacity, 8);
    }

    #[test]
    fn test_batch_size_clamps_to_documented_range() {
        let config = LoggerConfig::default().with_batch_size(5000);
        assert_eq!(config.batch_size, MAX_BATCH_SIZE);

        let config = LoggerConfig::default().with_batch_size(0);
        assert_eq!(config.batch_size, MIN_BATCH_SIZE);
    }

    #[test]
    fn test_flush_interval_clamps_to_documented_range() {
        let config = LoggerConfig::default().with_flush_interval_ms(999_999);
        assert_eq!(config.flush_interval_ms, MAX_FLUSH_MS);

        let config = LoggerConfig::default().with_flush_interval_ms(0);
        assert_eq!(config.flush_interval_ms, MIN_FLUSH_MS);
    }

    #[test]
    fn test_writer_cpu_rejected_when_out_of_range() {
        let absurd_cpu = available_cpus() + 1000;
        let config = LoggerConfig::default().with_writer_cpu(Some(absurd_cpu));
        assert_eq!(config.writer_cpu, None);
    }

    #[test]
    fn test_presets_differ_from_default() {
        let low = LoggerConfig::low_latency();
        let high = LoggerConfig::high_throughput();
        assert!(low.queue_capacity < high.queue_capacity);
        assert!(low.batch_size < high.batch_size);
    }
}
