//! Upload worker pool.
//!
//! Each worker is a tokio task that claims jobs from the [`UploadQueue`],
//! runs the upload handler and reports the result back to the queue. A
//! separate reaper task returns claims abandoned by crashed workers.
//!
//! [`UploadQueue`]: labelhub_pipeline::UploadQueue

pub mod config;
pub mod pool;
pub mod reaper;

pub use config::WorkerConfig;
pub use pool::{spawn_workers, WorkerPool};
