//! Configuration loading
//!
//! Sources, later wins:
//! 1. `~/.refdata/config.toml` (or an explicit path)
//! 2. `.env` via dotenvy
//! 3. `DATABASE_URL` / `REFDATA_MAX_CONNECTIONS` environment variables
//!
//! [`DatabaseConfig::connect`] turns the result into a sqlx pool.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::debug;

use crate::error::{RefdataError, Result};

/// Default pool size. A read holds at most two connections at once.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

const DATABASE_URL_VAR: &str = "DATABASE_URL";
const MAX_CONNECTIONS_VAR: &str = "REFDATA_MAX_CONNECTIONS";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefdataConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl DatabaseConfig {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Database URL, or an actionable error when none is configured
    pub fn url(&self) -> Result<&str> {
        self.url.as_deref().ok_or_else(|| {
            RefdataError::config(format!(
                "no database URL configured\n\nSet {} or add [database] url = \"...\" to {:?}",
                DATABASE_URL_VAR,
                RefdataConfig::config_path()
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        check_max_connections(self.max_connections, "database.max_connections")?;
        Ok(())
    }

    /// Open a Postgres pool limited to `max_connections`.
    ///
    /// # Errors
    ///
    /// `Config` when no URL is set or the pool size is zero; `Database` when
    /// the URL is malformed or the server is unreachable.
    pub async fn connect(&self) -> Result<PgPool> {
        self.validate()?;
        let url = self.url()?;

        debug!(max_connections = self.max_connections, "opening connection pool");
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(url)
            .await?;

        Ok(pool)
    }
}

fn check_max_connections(value: u32, source: &str) -> Result<u32> {
    if value == 0 {
        return Err(RefdataError::config(format!("{} must be at least 1", source)));
    }
    Ok(value)
}

impl RefdataConfig {
    /// Load config from `path`, or from ~/.refdata/config.toml when it exists,
    /// then apply environment overrides.
    ///
    /// An explicit path that cannot be read is an error; a missing default
    /// file is not.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::config_path();
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    debug!(path = %default_path.display(), "no config file, using defaults");
                    Self::default()
                }
            }
        };

        dotenvy::dotenv().ok();
        config.apply_overrides(
            env::var(DATABASE_URL_VAR).ok(),
            env::var(MAX_CONNECTIONS_VAR).ok(),
        )?;

        Ok(config)
    }

    /// Get config file path: ~/.refdata/config.toml
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".refdata/config.toml")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            RefdataError::config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            RefdataError::config(format!("Failed to parse config file (invalid TOML): {}", e))
        })?;
        config.database.validate()?;
        Ok(config)
    }

    /// Apply overrides as read from the environment.
    pub fn apply_overrides(
        &mut self,
        database_url: Option<String>,
        max_connections: Option<String>,
    ) -> Result<()> {
        if let Some(url) = database_url.filter(|url| !url.trim().is_empty()) {
            self.database.url = Some(url);
        }

        if let Some(raw) = max_connections {
            let parsed: u32 = raw.trim().parse().map_err(|_| {
                RefdataError::config(format!(
                    "{} must be a positive integer, got '{}'",
                    MAX_CONNECTIONS_VAR, raw
                ))
            })?;
            self.database.max_connections = check_max_connections(parsed, MAX_CONNECTIONS_VAR)?;
        }

        Ok(())
    }

    /// See [`DatabaseConfig::url`]
    pub fn database_url(&self) -> Result<&str> {
        self.database.url()
    }
}
