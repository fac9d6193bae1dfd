use std::time::Duration;

use labelhub_core::config::{env_parse_or, env_required, ConfigError};

/// Worker process settings.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    /// Number of concurrent worker tasks.
    pub concurrency: usize,
    /// Sleep between polls when the queue is empty.
    pub poll_interval: Duration,
    /// Claims older than this are presumed abandoned.
    pub visibility_timeout: Duration,
}

impl WorkerConfig {
    /// Load from environment variables.
    ///
    /// | Env var                          | Default |
    /// |----------------------------------|---------|
    /// | `DATABASE_URL`                   | required |
    /// | `WORKER_CONCURRENCY`             | `4`     |
    /// | `WORKER_POLL_INTERVAL_MS`        | `1000`  |
    /// | `UPLOAD_VISIBILITY_TIMEOUT_SECS` | `600`   |
    pub fn from_env() -> Result<Self, ConfigError> {
        let concurrency: usize = env_parse_or("WORKER_CONCURRENCY", 4)?;
        if concurrency == 0 {
            return Err(ConfigError::Invalid {
                var: "WORKER_CONCURRENCY",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            database_url: env_required("DATABASE_URL")?,
            concurrency,
            poll_interval: Duration::from_millis(env_parse_or("WORKER_POLL_INTERVAL_MS", 1000)?),
            visibility_timeout: Duration::from_secs(env_parse_or(
                "UPLOAD_VISIBILITY_TIMEOUT_SECS",
                600,
            )?),
        })
    }
}
