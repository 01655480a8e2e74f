//! Environment configuration for the database pool and the HTTP listener.
//!
//! `.env` is read first when present; variables already set win.

use std::env;
use std::str::FromStr;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|k| env::var(k).ok())
    }

    /// `DATABASE_URL` if set, else assembled from `DB_USER`, `DB_PASSWORD`,
    /// `DB_HOST`, `DB_PORT` and `DB_NAME`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let url = match lookup("DATABASE_URL") {
            Some(url) => url,
            None => {
                let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
                let port: u16 = parse("DB_PORT", lookup("DB_PORT"), 5432)?;
                format!(
                    "postgres://{}:{}@{}:{}/{}",
                    var("DB_USER", "postgres"),
                    var("DB_PASSWORD", "postgres"),
                    var("DB_HOST", "localhost"),
                    port,
                    var("DB_NAME", "postgres")
                )
            }
        };
        if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
            return Err(ConfigError::DatabaseUrl(url));
        }
        let max_connections = parse("DB_MAX_CONNECTIONS", lookup("DB_MAX_CONNECTIONS"), 5)?;
        Ok(DatabaseConfig { url, max_connections })
    }

    pub async fn connect(&self) -> Result<PgPool, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(&self.url)
            .await?;
        info!(max_connections = self.max_connections, "database pool ready");
        Ok(pool)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database: DatabaseConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|k| env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(AppConfig {
            host: lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse("APP_PORT", lookup("APP_PORT"), 8080)?,
            database: DatabaseConfig::from_lookup(&lookup)?,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T: FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: format!("'{}': {}", raw, e),
        }),
    }
}
