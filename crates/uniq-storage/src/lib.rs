//! S3-compatible artifact storage.
//!
//! This crate provides:
//! - The `ArtifactStore` contract (`put` / `delete`) consumed by the pipeline
//! - An S3 implementation with public URL construction
//! - Content-type mapping for supported containers

pub mod client;
pub mod error;
pub mod store;

pub use client::{S3Config, S3Store};
pub use error::{StorageError, StorageResult};
pub use store::{content_type_for, ArtifactStore};
