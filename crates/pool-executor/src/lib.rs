//! # Pool Executor
//!
//! A bounded worker pool for async work items, with the familiar executor
//! contract: `start`, `submit`, `map`, `shutdown` and a scoped lifecycle.
//!
//! ## Features
//!
//! - **Bounded FIFO queue**: a full queue rejects submissions immediately with
//!   [`ExecutorError::QueueFull`] instead of suspending the submitter
//! - **Fixed fan-out**: `max_workers` worker loops pull from one shared queue
//! - **Result handles**: every submission returns a [`ResultHandle`] that
//!   resolves to a value, a captured failure, or cancellation
//! - **Graceful or forced shutdown**: drain outstanding work, or cancel queued
//!   and in-flight items
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       PoolExecutor                           │
//! │  submit / map ──► BoundedQueue (FIFO, max_queue_size)        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ pop
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │     Worker 0   │   Worker 1   │   ...   │   Worker N-1       │
//! │  (invoke callable, resolve ResultHandle, mark item done)    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ CancellationToken
//!                              ▼
//!                    shutdown(wait) stops all
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use pool_executor::prelude::*;
//!
//! let handles = PoolExecutor::scoped(ExecutorConfig::default(), |pool| async move {
//!     pool.map(
//!         |name: &'static str| async move { Ok::<_, anyhow::Error>(format!("Hello, {name}")) },
//!         ["romeo", "julliet", "mercucio"],
//!     )
//! })
//! .await??;
//!
//! for handle in handles {
//!     println!("{}", handle.result().await?);
//! }
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod handle;
mod item;
mod queue;
mod worker;

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::ExecutorConfig;
    pub use crate::error::{ExecutorError, TaskError};
    pub use crate::executor::{ExecutorState, PoolExecutor};
    pub use crate::handle::{HandleStatus, ResultHandle};
}

// Re-export key types at crate root
pub use config::{ConfigError, ExecutorConfig, DEFAULT_MAX_WORKERS};
pub use error::{ExecutorError, TaskError};
pub use executor::{ExecutorState, PoolExecutor};
pub use handle::{HandleStatus, ResultHandle};
