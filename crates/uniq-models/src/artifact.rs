//! Uploaded artifact model.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix for every uploaded copy.
pub const ARTIFACT_KEY_PREFIX: &str = "videos/";

/// Build a fresh storage key: `videos/{uuid}{extension}`.
///
/// `extension` is expected with its leading dot (as returned by
/// [`crate::video::extension_of`]); an empty string yields a bare UUID key.
pub fn artifact_key(extension: &str) -> String {
    format!("{}{}{}", ARTIFACT_KEY_PREFIX, Uuid::new_v4(), extension)
}

/// One finished, uploaded copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Artifact {
    /// Storage key
    pub key: String,
    /// Durable URL returned by the store
    pub url: String,
    /// Production round that produced the copy (1-based)
    pub round: u32,
    pub uploaded_at: DateTime<Utc>,
}

impl Artifact {
    pub fn new(key: impl Into<String>, url: impl Into<String>, round: u32) -> Self {
        Self {
            key: key.into(),
            url: url.into(),
            round,
            uploaded_at: Utc::now(),
        }
    }
}
