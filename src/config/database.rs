//! Pool de PostgreSQL
//!
//! Tamaños y tiempos del pool, configurables con `DB_*`. Reservas y
//! cotizaciones comparten el mismo pool.

use anyhow::{anyhow, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use super::environment::parse_var;

/// Opciones del pool de conexiones
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: 20,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(300),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            max_connections: parse_var("DB_MAX_CONNECTIONS", defaults.max_connections)?,
            min_connections: parse_var("DB_MIN_CONNECTIONS", defaults.min_connections)?,
            acquire_timeout: secs_var("DB_ACQUIRE_TIMEOUT_SECS", defaults.acquire_timeout)?,
            idle_timeout: secs_var("DB_IDLE_TIMEOUT_SECS", defaults.idle_timeout)?,
            max_lifetime: secs_var("DB_MAX_LIFETIME_SECS", defaults.max_lifetime)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(anyhow!("DB_MAX_CONNECTIONS must be at least 1"));
        }
        if self.min_connections > self.max_connections {
            return Err(anyhow!(
                "DB_MIN_CONNECTIONS ({}) cannot exceed DB_MAX_CONNECTIONS ({})",
                self.min_connections,
                self.max_connections
            ));
        }
        if self.acquire_timeout.is_zero() {
            return Err(anyhow!("DB_ACQUIRE_TIMEOUT_SECS must be positive"));
        }
        Ok(())
    }

    fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(self.idle_timeout)
            .max_lifetime(self.max_lifetime)
    }

    /// Abrir el pool contra `url`
    pub async fn create_pool(&self, url: &str) -> Result<PgPool, sqlx::Error> {
        self.pool_options().connect(url).await
    }
}

fn secs_var(key: &str, default: Duration) -> Result<Duration> {
    parse_var(key, default.as_secs()).map(Duration::from_secs)
}
