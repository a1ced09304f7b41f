//! geocluster-session: clustering orchestration for live map views.
//!
//! The engine in `geocluster-core` is a pure function. This crate wraps it
//! for callers that recluster on every viewport tick and every feed update.
//!
//! # Components
//!
//! - **`session`** — Synchronous per-consumer session: latest reading per
//!   sensor, grid-index reuse, skip-if-unchanged reclustering
//! - **`worker`** — Background tokio worker: debounces bursts of view
//!   changes and never delivers a result older than the newest request
//! - **`config`** — Debounce window, result buffering, engine knobs

pub mod config;
pub mod error;
pub mod session;
pub mod worker;

pub use config::SessionConfig;
pub use error::{WorkerError, WorkerResult};
pub use session::{ApplySummary, ClusterSession};
pub use worker::{ClusterResult, ClusterWorker, WorkerStats};
