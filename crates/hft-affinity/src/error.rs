use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AffinityError {
    #[error("OS refused to pin thread to cpu {cpu}")]
    PinRefused { cpu: usize },
    #[error("NUMA preference for node {node} is unavailable on this platform")]
    NumaUnavailable { node: usize },
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPoolError {
    #[error("task queue is full")]
    QueueFull,
    #[error("worker pool has been shut down")]
    Shutdown,
}

#[derive(Debug, Error)]
#[error("worker task panicked")]
pub struct WorkerPanicked;
