//! CPU pinning, NUMA preference, and an off-hot-path worker pool.
//!
//! Nothing here is wait-free or even lock-free on purpose: a thread either
//! pins itself once at startup, or a worker blocks on a condition variable
//! waiting for deferred work. None of it runs per market event.

pub mod affinity;
pub mod error;
pub mod worker_pool;

pub use affinity::{pin_to_cpu, prefer_numa_node, spawn_pinned};
pub use error::{AffinityError, WorkerPanicked, WorkerPoolError};
pub use worker_pool::{PoolStats, TaskHandle, WorkerPool};
