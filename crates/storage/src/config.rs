//! Backend selection from the environment.

use std::path::PathBuf;
use std::sync::Arc;

use labelhub_core::config::{env_optional, env_or, env_parse_or, env_required, ConfigError};

use crate::{LocalStorage, S3Config, S3Storage, SharedStorage};

const DEFAULT_LOCAL_ROOT: &str = "./object-store";
const DEFAULT_REGION: &str = "us-east-1";

/// Which object store to talk to.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    Local { root: PathBuf },
    S3(S3Config),
}

impl StorageConfig {
    /// Load from `STORAGE_BACKEND` (`local` or `s3`) and the backend's own
    /// variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        match env_or("STORAGE_BACKEND", "local").to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local {
                root: PathBuf::from(env_or("STORAGE_LOCAL_ROOT", DEFAULT_LOCAL_ROOT)),
            }),
            "s3" => Ok(Self::S3(S3Config {
                endpoint_url: env_optional("S3_ENDPOINT_URL"),
                bucket: env_required("S3_BUCKET")?,
                region: env_or("S3_REGION", DEFAULT_REGION),
                force_path_style: env_parse_or("S3_FORCE_PATH_STYLE", false)?,
            })),
            other => Err(ConfigError::Invalid {
                var: "STORAGE_BACKEND",
                value: other.to_string(),
                reason: "expected 'local' or 's3'".to_string(),
            }),
        }
    }
}

/// Construct the configured gateway.
pub async fn build_gateway(config: &StorageConfig) -> SharedStorage {
    match config {
        StorageConfig::Local { root } => {
            tracing::info!(root = %root.display(), "Using local object storage");
            Arc::new(LocalStorage::new(root.clone()))
        }
        StorageConfig::S3(s3) => {
            tracing::info!(
                bucket = %s3.bucket,
                region = %s3.region,
                endpoint = ?s3.endpoint_url,
                "Using S3 object storage"
            );
            Arc::new(S3Storage::new(s3.clone()).await)
        }
    }
}
