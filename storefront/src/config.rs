// storefront/src/config.rs

use crate::errors::{AppError, Result}; // Use AppError specific Result
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
  Pretty,
  Json,
}

#[derive(Debug, Clone)] // Clone is useful if parts of config are passed around
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub database_url: String,

  // Connection pool and row-lock bounds
  pub db_max_connections: u32,
  pub db_acquire_timeout: Duration,
  pub lock_timeout: Duration,

  // Token signing
  pub jwt_access_secret: String,
  pub jwt_refresh_secret: String,
  pub access_token_ttl: Duration,
  pub refresh_token_ttl: Duration,

  pub run_migrations: bool,
  pub log_format: LogFormat,
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present
    Self::from_lookup(|name| env::var(name).ok())
  }

  /// Builds the config from any key lookup. `from_env` passes the process environment.
  pub fn from_lookup<F>(lookup: F) -> Result<Self>
  where
    F: Fn(&str) -> Option<String>,
  {
    let required = |var_name: &str| {
      lookup(var_name)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Config(format!("Missing environment variable '{}'", var_name)))
    };
    let or_default = |var_name: &str, default: &str| lookup(var_name).unwrap_or_else(|| default.to_string());

    let server_host = or_default("SERVER_HOST", "127.0.0.1");
    let server_port: u16 = parse_var("SERVER_PORT", &or_default("SERVER_PORT", "3001"))?;
    let database_url = required("DATABASE_URL")?;

    let db_max_connections: u32 = parse_var("DB_MAX_CONNECTIONS", &or_default("DB_MAX_CONNECTIONS", "10"))?;
    if db_max_connections == 0 {
      return Err(AppError::Config("DB_MAX_CONNECTIONS must be at least 1".to_string()));
    }
    let db_acquire_timeout_secs: u64 =
      parse_var("DB_ACQUIRE_TIMEOUT_SECS", &or_default("DB_ACQUIRE_TIMEOUT_SECS", "5"))?;
    if db_acquire_timeout_secs == 0 {
      return Err(AppError::Config("DB_ACQUIRE_TIMEOUT_SECS must be at least 1".to_string()));
    }
    // Postgres reads a lock_timeout of 0 as "wait forever".
    let lock_timeout_ms: u64 = parse_var("LOCK_TIMEOUT_MS", &or_default("LOCK_TIMEOUT_MS", "5000"))?;
    if lock_timeout_ms == 0 {
      return Err(AppError::Config("LOCK_TIMEOUT_MS must be at least 1".to_string()));
    }
    let db_acquire_timeout = Duration::from_secs(db_acquire_timeout_secs);
    let lock_timeout = Duration::from_millis(lock_timeout_ms);

    let jwt_access_secret = required("JWT_SECRET_KEY_ACCESS_TOKEN")?;
    let jwt_refresh_secret = required("JWT_SECRET_KEY_REFRESH_TOKEN")?;
    let access_token_ttl =
      Duration::from_secs(parse_var("ACCESS_TOKEN_TTL_SECS", &or_default("ACCESS_TOKEN_TTL_SECS", "900"))?);
    let refresh_token_ttl =
      Duration::from_secs(parse_var("REFRESH_TOKEN_TTL_SECS", &or_default("REFRESH_TOKEN_TTL_SECS", "604800"))?);

    let run_migrations: bool = parse_var("RUN_MIGRATIONS", &or_default("RUN_MIGRATIONS", "true"))?;
    let log_format = match or_default("LOG_FORMAT", "pretty").to_ascii_lowercase().as_str() {
      "pretty" => LogFormat::Pretty,
      "json" => LogFormat::Json,
      other => return Err(AppError::Config(format!("Invalid LOG_FORMAT: {}", other))),
    };

    tracing::info!("Application configuration loaded successfully.");
    // Secrets and the database URL stay out of the logs.
    tracing::debug!(%server_host, server_port, db_max_connections, ?lock_timeout, "Loaded config details");

    Ok(Self {
      server_host,
      server_port,
      database_url,
      db_max_connections,
      db_acquire_timeout,
      lock_timeout,
      jwt_access_secret,
      jwt_refresh_secret,
      access_token_ttl,
      refresh_token_ttl,
      run_migrations,
      log_format,
    })
  }

  pub fn server_address(&self) -> String {
    format!("{}:{}", self.server_host, self.server_port)
  }

  /// `memory://` selects the in-process store instead of Postgres.
  pub fn uses_memory_store(&self) -> bool {
    self.database_url.starts_with("memory://")
  }
}

fn parse_var<T>(var_name: &str, raw: &str) -> Result<T>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  raw
    .trim()
    .parse::<T>()
    .map_err(|e| AppError::Config(format!("Invalid {}: {}", var_name, e)))
}
