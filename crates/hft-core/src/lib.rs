//! Lock-free memory pool and ring primitives for the trading core's hot
//! path: a typed block allocator, an SPSC ring, and an MPMC ring, plus the
//! shared back-off and debug-assertion helpers they're built from.
//!
//! Every type in this crate is allocation-free after construction and
//! wait-free per attempt on its hot-path operations; see each module for
//! its specific ordering and failure contract.

pub mod backoff;
pub mod ids;
#[macro_use]
pub mod invariants;
pub mod mpmc;
pub mod pool;
pub mod spsc;

pub use backoff::Backoff;
pub use ids::{ClientId, OrderId, OrderStatus, Price, Quantity, Side, TickerId};
pub use mpmc::MpmcRing;
pub use pool::{BlockHandle, MemoryPool, PoolError, ZeroPolicy};
pub use spsc::SpscRing;
