//! FFmpeg CLI wrapper for video uniqueization.
//!
//! This crate provides:
//! - A narrow process-runner seam so every tool invocation can be faked in tests
//! - Type-safe FFmpeg command building
//! - Hardware encoder capability probing
//! - FFprobe resolution lookup
//! - Randomized per-copy recipe generation
//! - The single-copy transcode worker
//! - Input discovery and temp-file helpers

pub mod capability;
pub mod command;
pub mod discovery;
pub mod error;
pub mod fs_utils;
pub mod probe;
pub mod recipe;
pub mod transcode;

pub use capability::{check_toolchain, CapabilityProber};
pub use command::{FfmpegCommand, ProcessOutput, ProcessRunner, TokioProcessRunner};
pub use discovery::{collect_videos, open_source};
pub use error::{MediaError, MediaResult};
pub use probe::probe_resolution;
pub use recipe::RecipeGenerator;
pub use transcode::{diagnostic_tail, Transcoder, DEFAULT_ENCODE_TIMEOUT};
