use axum::http::HeaderValue;
use labelhub_core::config::{env_or, env_parse_or, parse_value, ConfigError};

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    ///
    /// Every CORS origin must be a valid header value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let cors_origins = parse_origins(&env_or("CORS_ORIGINS", "http://localhost:5173"))?;

        Ok(Self {
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse_or("PORT", 3000)?,
            cors_origins,
            request_timeout_secs: env_parse_or("REQUEST_TIMEOUT_SECS", 30)?,
        })
    }
}

fn parse_origins(raw: &str) -> Result<Vec<String>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|origin| {
            parse_value::<HeaderValue>("CORS_ORIGINS", origin)?;
            Ok(origin.to_string())
        })
        .collect()
}
