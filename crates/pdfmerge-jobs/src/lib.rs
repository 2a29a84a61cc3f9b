//! Asynchronous merge jobs.
//!
//! Provides:
//! - `JobScheduler`: admission control, upload persistence and dispatch
//! - `JobStore`: shared job table with a done-signal
//! - `MergeJob` / `JobStatus`: job snapshots as seen by pollers
//!
//! Each accepted job merges on the blocking thread pool; its transient
//! input copies are removed whether it succeeds or fails.

pub mod error;
pub mod executor;
pub mod job;
pub mod scheduler;
pub mod store;

pub use error::JobError;
pub use executor::FileTask;
pub use job::{Capacity, JobId, JobStatus, MergeJob};
pub use scheduler::{JobScheduler, JobsConfig, Upload};
pub use store::JobStore;
