//! Server settings read from the environment.

use std::{path::PathBuf, time::Duration as StdDuration};

use chrono::Duration;
use db::RetryConfig;
use secrecy::SecretString;
use services::services::session_sweeper::SessionSweeperConfig;
use thiserror::Error;
use utils::assets::database_path;

/// Only ever used by debug builds.
const DEV_JWT_SECRET: &str = "boardflow-development-secret-do-not-deploy";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BOARDFLOW_JWT_SECRET must be set")]
    MissingJwtSecret,
    #[error("invalid value '{value}' for {var}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    /// `0` lets the OS pick a free port.
    pub port: u16,
    pub database_path: PathBuf,
    pub jwt_secret: SecretString,
    pub retry: RetryConfig,
    pub sweeper: SessionSweeperConfig,
}

fn parse_var<T: std::str::FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
        Err(_) => Ok(None),
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = match parse_var::<u16>("BACKEND_PORT")? {
            Some(port) => port,
            None => parse_var::<u16>("PORT")?.unwrap_or(0),
        };

        let jwt_secret = match std::env::var("BOARDFLOW_JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => SecretString::from(secret),
            _ if cfg!(debug_assertions) => {
                tracing::warn!("BOARDFLOW_JWT_SECRET not set, using the development secret");
                SecretString::from(DEV_JWT_SECRET.to_string())
            }
            _ => return Err(ConfigError::MissingJwtSecret),
        };

        let mut retry = RetryConfig::default();
        if let Some(attempts) = parse_var::<u32>("BOARDFLOW_MOVE_MAX_ATTEMPTS")? {
            retry = RetryConfig::with_max_attempts(attempts);
        }

        let mut sweeper = SessionSweeperConfig::default();
        if let Some(secs) = parse_var::<u64>("BOARDFLOW_SESSION_SWEEP_INTERVAL_SECS")? {
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    var: "BOARDFLOW_SESSION_SWEEP_INTERVAL_SECS",
                    value: secs.to_string(),
                });
            }
            sweeper.sweep_interval = StdDuration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<i64>("BOARDFLOW_SESSION_IDLE_SECS")? {
            sweeper.idle_threshold = Duration::seconds(secs.max(1));
        }

        Ok(Self {
            host,
            port,
            database_path: database_path(),
            jwt_secret,
            retry,
            sweeper,
        })
    }
}
