//! Async logging pipeline for the trading core.
//!
//! Producers build a fixed-size [`LogRecord`] on the stack and enqueue it on
//! an [`hft_core::MpmcRing`]; a single dedicated writer thread drains the
//! queue in batches and performs gathered I/O to the log file. The producer
//! call is the only part of this crate on anyone's hot path — tens of
//! nanoseconds in the common case, never blocking, never allocating.
//!
//! # Environment variables
//!
//! | Variable                  | Range       | Default | Notes                              |
//! |----------------------------|-------------|---------|-------------------------------------|
//! | `LOGGER_QUEUE_CAPACITY`    | positive    | 16384   | clamped to 65536, rounded to pow2  |
//! | `LOGGER_SPIN_BEFORE_WAIT`  | non-negative| 500     |                                      |
//! | `LOGGER_BATCH`             | 1..=1024    | 128     |                                      |
//! | `LOGGER_FLUSH_MS`          | 1..=10000   | 100     |                                      |
//! | `LOGGER_WRITER_CPU`        | CPU index   | unset   | ignored if >= online CPU count     |
//! | `LOGGER_TEST_FASTPATH`     | `"1"`       | unset   | test-only, see [`LoggerConfig`]    |

pub mod config;
pub mod error;
pub mod logger;
pub mod record;
pub mod timestamp;
mod writer;

pub use config::LoggerConfig;
pub use error::LogFileError;
pub use logger::{Logger, LoggerStats};
pub use record::{Level, LogRecord, PAYLOAD_CAPACITY};
