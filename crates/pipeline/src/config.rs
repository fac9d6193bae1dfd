use std::path::PathBuf;

use labelhub_core::chunking::DEFAULT_CHUNK_SIZE;
use labelhub_core::config::{env_or, env_parse_or, ConfigError};
use labelhub_core::retry::DEFAULT_MAX_ATTEMPTS;

/// Filesystem layout and tuning shared by ingestion, upload and assembly.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Extracted archives must live strictly below this directory.
    pub extract_root: PathBuf,
    /// One file per queued upload job.
    pub staging_root: PathBuf,
    /// Local copies of assembled and downloaded files, one directory per
    /// dataset.
    pub cache_root: PathBuf,
    /// URL path segment the cache root is served under.
    pub cache_root_name: String,
    pub chunk_size: u64,
    pub max_attempts: i32,
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let chunk_size: u64 = env_parse_or("CHUNK_SIZE_BYTES", DEFAULT_CHUNK_SIZE)?;
        if chunk_size == 0 {
            return Err(ConfigError::Invalid {
                var: "CHUNK_SIZE_BYTES",
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        let max_attempts: i32 = env_parse_or("UPLOAD_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
        if max_attempts < 1 {
            return Err(ConfigError::Invalid {
                var: "UPLOAD_MAX_ATTEMPTS",
                value: max_attempts.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            extract_root: PathBuf::from(env_or("EXTRACT_ROOT", "./extracted")),
            staging_root: PathBuf::from(env_or("STAGING_ROOT", "./staging")),
            cache_root: PathBuf::from(env_or("CACHE_ROOT", "./assembled-images")),
            cache_root_name: env_or("CACHE_ROOT_NAME", "assembled-images")
                .trim_matches('/')
                .to_string(),
            chunk_size,
            max_attempts,
        })
    }

    /// Per-dataset cache directory.
    pub fn dataset_cache_dir(&self, dataset_id: &str) -> PathBuf {
        self.cache_root.join(dataset_id)
    }

    /// URL path a cached file is served at.
    pub fn served_path(&self, dataset_id: &str, file_name: &str) -> String {
        format!("/{}/{dataset_id}/{file_name}", self.cache_root_name)
    }
}
