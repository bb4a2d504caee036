//! S3 client implementation.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, error, info};

use crate::error::{StorageError, StorageResult};
use crate::store::{content_type_for, ArtifactStore};

/// Default region for S3-compatible endpoints.
pub const DEFAULT_REGION: &str = "ru-central1";

/// Configuration for the S3 client.
#[derive(Clone)]
pub struct S3Config {
    /// S3 API endpoint URL
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region
    pub region: String,
    /// Base for public URLs; defaults to `{endpoint}/{bucket}`
    pub public_base_url: Option<String>,
}

impl S3Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> StorageResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| StorageError::config_error(format!("{} not set", name)))
        };

        Ok(Self {
            endpoint_url: required("S3_ENDPOINT_URL")?,
            access_key_id: required("S3_ACCESS_KEY_ID")?,
            secret_access_key: required("S3_SECRET_ACCESS_KEY")?,
            bucket_name: required("S3_BUCKET_NAME")?,
            region: lookup("S3_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            public_base_url: lookup("S3_PUBLIC_BASE_URL").filter(|v| !v.is_empty()),
        })
    }

    /// Public URL for an object key.
    pub fn public_url(&self, key: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
            None => format!(
                "{}/{}/{}",
                self.endpoint_url.trim_end_matches('/'),
                self.bucket_name,
                key
            ),
        }
    }
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("endpoint_url", &self.endpoint_url)
            .field("access_key_id", &mask(&self.access_key_id))
            .field("secret_access_key", &mask(&self.secret_access_key))
            .field("bucket_name", &self.bucket_name)
            .field("region", &self.region)
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}

/// Show only the first and last four characters of a secret.
fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// S3-compatible artifact store.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    config: S3Config,
}

impl S3Store {
    /// Create a new client from configuration.
    pub fn new(config: S3Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "uniq-static",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            config,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(S3Config::from_env()?))
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket_name
    }
}

#[async_trait]
impl ArtifactStore for S3Store {
    async fn put(&self, path: &Path, key: &str) -> StorageResult<String> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        let size = tokio::fs::metadata(path).await?.len();
        debug!("Uploading {} ({} bytes) to {}", path.display(), size, key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.config.bucket_name)
            .key(key)
            .body(body)
            .content_type(content_type_for(path))
            .send()
            .await
            .map_err(|e| {
                error!("Upload of {} failed: {}", key, e);
                StorageError::upload_failed(e.to_string())
            })?;

        let url = self.config.public_url(key);
        info!("Uploaded {} to {}", path.display(), url);
        Ok(url)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        debug!("Deleting {}", key);

        self.client
            .delete_object()
            .bucket(&self.config.bucket_name)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::delete_failed(e.to_string()))?;

        info!("Deleted {}", key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn full_env() -> HashMap<String, String> {
        env(&[
            ("S3_ENDPOINT_URL", "https://storage.example.net/"),
            ("S3_ACCESS_KEY_ID", "AKIAEXAMPLEKEY123"),
            ("S3_SECRET_ACCESS_KEY", "supersecretvalue987"),
            ("S3_BUCKET_NAME", "clips"),
        ])
    }

    #[test]
    fn test_config_from_lookup() {
        let vars = full_env();
        let config = S3Config::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.region, DEFAULT_REGION);
        assert_eq!(
            config.public_url("videos/a.mp4"),
            "https://storage.example.net/clips/videos/a.mp4"
        );
    }

    #[test]
    fn test_public_base_url_override() {
        let mut vars = full_env();
        vars.insert("S3_PUBLIC_BASE_URL".into(), "https://cdn.example.net/".into());
        let config = S3Config::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.public_url("videos/a.mp4"), "https://cdn.example.net/videos/a.mp4");
    }

    #[test]
    fn test_missing_required_variable() {
        let mut vars = full_env();
        vars.remove("S3_BUCKET_NAME");
        let err = S3Config::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains("S3_BUCKET_NAME"));
    }

    #[test]
    fn test_debug_masks_secrets() {
        let vars = full_env();
        let config = S3Config::from_lookup(|k| vars.get(k).cloned()).unwrap();
        let printed = format!("{:?}", config);
        assert!(!printed.contains("supersecretvalue987"));
        assert!(printed.contains("supe...e987"));
    }
}
