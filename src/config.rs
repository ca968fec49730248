// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once at startup. A missing
//! or weak signing secret is fatal: the process refuses to start rather
//! than failing on every request.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Directory holding the redb database | `./data` |
//! | `JWT_SECRET` | HS256 signing secret (at least 32 bytes) | Required |
//! | `SESSION_TTL_SECS` | Absolute session / access token lifetime | `604800` (7 days) |
//! | `STEP_UP_TTL_SECS` | Step-up (passcode) token lifetime | `86400` (1 day) |
//! | `STORE_TIMEOUT_MS` | Upper bound on every store call | `2000` |
//! | `SESSION_SWEEP_INTERVAL_SECS` | Expired-session purge interval | `300` |
//! | `RESET_CONFIRMATION_TTL_SECS` | Window between OTP verification and reset | `900` |
//! | `GEOLOCATION_URL` | IP geolocation endpoint | `https://ipwho.is` |
//! | `ADMIN_EMAIL` / `ADMIN_PASSWORD` | Seed super-admin account | Optional |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the database directory.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Environment variable name for the token signing secret.
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";

pub const SESSION_TTL_ENV: &str = "SESSION_TTL_SECS";
pub const STEP_UP_TTL_ENV: &str = "STEP_UP_TTL_SECS";
pub const STORE_TIMEOUT_ENV: &str = "STORE_TIMEOUT_MS";
pub const SESSION_SWEEP_ENV: &str = "SESSION_SWEEP_INTERVAL_SECS";
pub const RESET_CONFIRMATION_TTL_ENV: &str = "RESET_CONFIRMATION_TTL_SECS";
pub const GEOLOCATION_URL_ENV: &str = "GEOLOCATION_URL";
pub const ADMIN_EMAIL_ENV: &str = "ADMIN_EMAIL";
pub const ADMIN_PASSWORD_ENV: &str = "ADMIN_PASSWORD";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Minimum accepted length of the HS256 secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Default session lifetime (7 days).
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 7);

/// Default step-up token lifetime (1 day).
pub const DEFAULT_STEP_UP_TTL: Duration = Duration::from_secs(60 * 60 * 24);

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(2000);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);
pub const DEFAULT_RESET_CONFIRMATION_TTL: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_GEOLOCATION_URL: &str = "https://ipwho.is";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{0} must be at least {MIN_SECRET_LEN} bytes")]
    WeakSecret(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Credentials for the super-admin account seeded at startup.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
}

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub jwt_secret: String,
    pub session_ttl: Duration,
    pub step_up_ttl: Duration,
    pub store_timeout: Duration,
    pub sweep_interval: Duration,
    pub reset_confirmation_ttl: Duration,
    pub geolocation_url: String,
    pub admin_seed: Option<AdminSeed>,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = env::var(JWT_SECRET_ENV).map_err(|_| ConfigError::Missing(JWT_SECRET_ENV))?;
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::WeakSecret(JWT_SECRET_ENV));
        }

        let admin_seed = match (env::var(ADMIN_EMAIL_ENV), env::var(ADMIN_PASSWORD_ENV)) {
            (Ok(email), Ok(password)) if !email.is_empty() && !password.is_empty() => {
                Some(AdminSeed { email, password })
            }
            _ => None,
        };

        Ok(Self {
            host: env::var(HOST_ENV).unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_env(PORT_ENV, 8080u16)?,
            data_dir: env::var(DATA_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            jwt_secret,
            session_ttl: secs_env(SESSION_TTL_ENV, DEFAULT_SESSION_TTL)?,
            step_up_ttl: secs_env(STEP_UP_TTL_ENV, DEFAULT_STEP_UP_TTL)?,
            store_timeout: Duration::from_millis(parse_env(
                STORE_TIMEOUT_ENV,
                DEFAULT_STORE_TIMEOUT.as_millis() as u64,
            )?),
            sweep_interval: secs_env(SESSION_SWEEP_ENV, DEFAULT_SWEEP_INTERVAL)?,
            reset_confirmation_ttl: secs_env(
                RESET_CONFIRMATION_TTL_ENV,
                DEFAULT_RESET_CONFIRMATION_TTL,
            )?,
            geolocation_url: env::var(GEOLOCATION_URL_ENV)
                .unwrap_or_else(|_| DEFAULT_GEOLOCATION_URL.to_string()),
            admin_seed,
        })
    }

    /// Path of the redb database file inside `data_dir`.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("coldasset.redb")
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(default),
    }
}

fn secs_env(name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    let secs = parse_env(name, default.as_secs())?;
    if secs == 0 {
        return Err(ConfigError::Invalid {
            name,
            value: "0".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_path_is_inside_data_dir() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("/tmp/coldasset"),
            jwt_secret: "x".repeat(MIN_SECRET_LEN),
            session_ttl: DEFAULT_SESSION_TTL,
            step_up_ttl: DEFAULT_STEP_UP_TTL,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            reset_confirmation_ttl: DEFAULT_RESET_CONFIRMATION_TTL,
            geolocation_url: DEFAULT_GEOLOCATION_URL.to_string(),
            admin_seed: None,
        };
        assert_eq!(
            config.database_path(),
            PathBuf::from("/tmp/coldasset/coldasset.redb")
        );
    }

    #[test]
    fn default_lifetimes_match_token_classes() {
        assert_eq!(DEFAULT_SESSION_TTL.as_secs(), 604_800);
        assert_eq!(DEFAULT_STEP_UP_TTL.as_secs(), 86_400);
    }
}
