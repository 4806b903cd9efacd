//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno y variables de configuración.

use anyhow::{anyhow, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use super::database::DatabaseConfig;

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub port: u16,
    pub host: String,
    pub cors_origins: Vec<String>,
    pub database_url: Option<String>,
    pub database_pool: DatabaseConfig,
    pub redis_url: Option<String>,
    // Proveedor de rutas HERE
    pub here_api_key: Option<String>,
    pub here_routing_url: String,
    pub route_timeout: Duration,
    pub route_max_retries: u32,
    pub pricing_strategy: String,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            port: 3000,
            host: "0.0.0.0".to_string(),
            cors_origins: Vec::new(),
            database_url: None,
            database_pool: DatabaseConfig::default(),
            redis_url: None,
            here_api_key: None,
            here_routing_url: "https://router.hereapi.com/v8/routes".to_string(),
            route_timeout: Duration::from_secs(10),
            route_max_retries: 2,
            pricing_strategy: "standard".to_string(),
        }
    }
}

impl EnvironmentConfig {
    /// Cargar configuración desde variables de entorno, con valores por defecto
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            environment: env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            port: parse_var("PORT", defaults.port)?,
            host: env::var("HOST").unwrap_or(defaults.host),
            cors_origins: env::var("CORS_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            database_url: non_empty_var("DATABASE_URL"),
            database_pool: DatabaseConfig::from_env()?,
            redis_url: non_empty_var("REDIS_URL"),
            here_api_key: non_empty_var("HERE_API_KEY"),
            here_routing_url: env::var("HERE_ROUTING_URL").unwrap_or(defaults.here_routing_url),
            route_timeout: Duration::from_secs(parse_var(
                "ROUTE_TIMEOUT_SECS",
                defaults.route_timeout.as_secs(),
            )?),
            route_max_retries: parse_var("ROUTE_MAX_RETRIES", defaults.route_max_retries)?,
            pricing_strategy: env::var("PRICING_STRATEGY").unwrap_or(defaults.pricing_strategy),
        })
    }

    /// Verificar si estamos en modo producción
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Obtener la dirección del servidor
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Leer una variable opcional ignorando valores vacíos
pub(crate) fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parsear una variable de entorno con valor por defecto
pub(crate) fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty_var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{} must be a valid value ('{}'): {}", key, raw, e)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EnvironmentConfig::default();
        assert_eq!(config.environment, "development");
        assert!(!config.is_production());
        assert_eq!(config.server_addr(), "0.0.0.0:3000");
        assert_eq!(config.route_max_retries, 2);
        assert_eq!(config.pricing_strategy, "standard");
    }

    #[test]
    fn test_parse_var_reports_invalid_values() {
        env::set_var("DELIVERY_BOOKING_TEST_PORT", "not-a-port");
        let result: Result<u16> = parse_var("DELIVERY_BOOKING_TEST_PORT", 3000);
        assert!(result.is_err());
        env::remove_var("DELIVERY_BOOKING_TEST_PORT");

        let fallback: u16 = parse_var("DELIVERY_BOOKING_TEST_PORT", 3000).unwrap();
        assert_eq!(fallback, 3000);
    }
}
