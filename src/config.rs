use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::invoice::DEMO_HOURLY_RATE;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub hourly_rate: f64,
}

impl Config {
    /// Reads an optional `.env` file, then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let loaded = dotenvy::dotenv();
        if let Some(err) = dotenv_failure(&loaded) {
            tracing::warn!(error = %err, "failed to load .env file");
        } else if let Ok(path) = &loaded {
            tracing::debug!(path = %path.display(), "loaded .env file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::MissingDatabaseUrl)?;

        let max_connections = parse_or(
            &lookup,
            "SUPERVISION_MAX_CONNECTIONS",
            DEFAULT_MAX_CONNECTIONS,
        )?;
        if max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(max_connections));
        }

        let rate = parse_or(&lookup, "SUPERVISION_HOURLY_RATE", DEMO_HOURLY_RATE)?;
        let hourly_rate = validate_rate(rate)?;

        Ok(Self {
            database_url,
            max_connections,
            hourly_rate,
        })
    }
}

/// A missing `.env` file is not a failure.
fn dotenv_failure(result: &dotenvy::Result<PathBuf>) -> Option<&dotenvy::Error> {
    match result {
        Err(err) if !err.not_found() => Some(err),
        _ => None,
    }
}

pub fn validate_rate(rate: f64) -> Result<f64, ConfigError> {
    if rate.is_finite() && rate >= 0.0 {
        Ok(rate)
    } else {
        Err(ConfigError::InvalidRate(rate))
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let Some(value) = lookup(name).filter(|value| !value.trim().is_empty()) else {
        return Ok(default);
    };

    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber { name, value })
}
