use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Runtime settings read from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub backend_base_url: String,
    pub library_dir: String,
    pub order_expiry: chrono::Duration,
    pub auth_timeout: Duration,
    pub profile_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };
        let or_default = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            host: or_default("HOST", "0.0.0.0"),
            port: parsed(&lookup, "PORT", 8080)?,
            supabase_url: required("SUPABASE_URL")?,
            supabase_anon_key: required("SUPABASE_ANON_KEY")?,
            backend_base_url: or_default("BACKEND_BASE_URL", "http://localhost:8000"),
            library_dir: or_default("LIBRARY_DIR", "library"),
            order_expiry: chrono::Duration::hours(parsed(&lookup, "ORDER_EXPIRY_HOURS", 24)?),
            auth_timeout: Duration::from_secs(parsed(&lookup, "AUTH_TIMEOUT_SECS", 15)?),
            profile_timeout: Duration::from_secs(parsed(&lookup, "PROFILE_TIMEOUT_SECS", 10)?),
        })
    }
}

fn parsed<T, F>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
