//! Uniqueization worker.
//!
//! This crate provides:
//! - Pipeline initialization (toolchain check and hardware encoder detection)
//! - The batch driver that fans one round of encodes out over a seed video
//! - The produce-N driver that chains rounds until N copies are uploaded
//! - Offline batch mode for local files
//! - Configuration, logging, metrics and retry helpers shared by the binaries

pub mod batch;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod offline;
pub mod pipeline;
pub mod producer;
pub mod retry;

pub use batch::{BatchDriver, BatchRequest, LocalBatchDriver};
pub use config::{BitrateBasis, SeedPolicy, WorkerConfig, MAX_COPIES_PER_CALL};
pub use error::{WorkerError, WorkerResult};
pub use logging::{init_tracing, JobLogger};
pub use offline::{run_offline, OfflineOptions, OfflineSummary};
pub use pipeline::Pipeline;
pub use producer::{JobStatus, ProductionJob, ProductionOutcome, UniqueProducer};
pub use retry::RetryConfig;
