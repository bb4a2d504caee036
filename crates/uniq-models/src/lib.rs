//! Shared data models for the uniqueization pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Hardware encoder backends and the detected capability profile
//! - Per-copy transformation recipes
//! - Source videos and supported container formats
//! - Uploaded artifacts and storage key construction

pub mod artifact;
pub mod backend;
pub mod recipe;
pub mod video;

// Re-export common types
pub use artifact::{artifact_key, Artifact};
pub use backend::{CapabilityProfile, EncoderBackend};
pub use recipe::{ColorCorrection, TransformRecipe};
pub use video::{extension_of, is_supported_extension, Resolution, SourceVideo, SUPPORTED_EXTENSIONS};
