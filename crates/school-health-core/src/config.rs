//! Runtime configuration.
//!
//! Values come from a JSON document or from `SCHOOL_HEALTH_*` environment variables.
//! Missing values fall back to [`CoreConfig::default`].

use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

pub const ENV_DB_PATH: &str = "SCHOOL_HEALTH_DB_PATH";
pub const ENV_MAX_ENROLLMENT_ATTEMPTS: &str = "SCHOOL_HEALTH_MAX_ENROLLMENT_ATTEMPTS";
pub const ENV_CONSULTATION_BUFFER_MINUTES: &str = "SCHOOL_HEALTH_CONSULTATION_BUFFER_MINUTES";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },

    #[error("JSON config error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Core library configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// SQLite file; `None` means in-memory
    pub database_path: Option<PathBuf>,
    /// Attempts at generate + insert before enrollment gives up
    pub max_enrollment_attempts: u32,
    /// Gap enforced after every consultation
    pub consultation_buffer_minutes: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            max_enrollment_attempts: 3,
            consultation_buffer_minutes: 0,
        }
    }
}

impl CoreConfig {
    /// Parse from JSON; absent fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: CoreConfig = serde_json::from_str(json)?;
        config.validated()
    }

    /// Read from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read using an arbitrary variable source.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let database_path = get(ENV_DB_PATH)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .or(defaults.database_path);
        let max_enrollment_attempts = parse_var(&get, ENV_MAX_ENROLLMENT_ATTEMPTS)?
            .unwrap_or(defaults.max_enrollment_attempts);
        let consultation_buffer_minutes = parse_var(&get, ENV_CONSULTATION_BUFFER_MINUTES)?
            .unwrap_or(defaults.consultation_buffer_minutes);

        Self {
            database_path,
            max_enrollment_attempts,
            consultation_buffer_minutes,
        }
        .validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.max_enrollment_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                name: "max_enrollment_attempts",
                value: "0".into(),
            });
        }
        Ok(self)
    }
}

fn parse_var<T, F>(get: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match get(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
    }
}
