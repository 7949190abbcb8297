use std::path::PathBuf;

use thiserror::Error;

/// Failure opening the backing log file. Never fatal: [`crate::Logger::new`]
/// logs this to stderr once and continues as a sink that drops every
/// record, rather than propagating it to the caller.
#[derive(Debug, Error)]
pub enum LogFileError {
    #[error("failed to create parent directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to open log file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
