//! Environment helpers shared by service configuration loaders.

use crate::error::AppError;

/// Read a mandatory environment variable.
pub fn require_env(name: &str) -> Result<String, AppError> {
    std::env::var(name)
        .map_err(|_| AppError::ConfigError(anyhow::anyhow!("{} must be set", name)))
}

/// Read an environment variable with a fallback.
pub fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}
