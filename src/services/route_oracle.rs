//! Servicio de cálculo de rutas (HERE Routing API v8)
//!
//! El proveedor se trata como poco fiable: cada llamada tiene timeout y se
//! reintenta un número acotado de veces ante fallos transitorios.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::EnvironmentConfig;
use crate::models::RouteResult;
use crate::utils::errors::{AppError, AppResult};
use crate::utils::validation::validate_coordinate_pair;

/// Oráculo de rutas: distancia/duración entre dos coordenadas "lat,lng"
#[async_trait]
pub trait RouteOracle: Send + Sync {
    /// `Ok(None)` cuando el proveedor no encuentra ruta
    async fn calculate_route(&self, origin: &str, destination: &str) -> AppResult<Option<RouteResult>>;
}

#[derive(Debug, Deserialize)]
struct HereRouteResponse {
    #[serde(default)]
    routes: Vec<HereRoute>,
}

#[derive(Debug, Deserialize)]
struct HereRoute {
    #[serde(default)]
    sections: Vec<HereSection>,
}

#[derive(Debug, Deserialize)]
struct HereSection {
    summary: HereSummary,
    #[serde(default)]
    polyline: String,
}

#[derive(Debug, Deserialize)]
struct HereSummary {
    duration: u64, // segundos
    length: u64,   // metros
}

/// Resultado de un intento individual
enum AttemptError {
    Transient(String),
    Fatal(AppError),
}

pub struct HereRouteOracle {
    client: Client,
    api_key: String,
    routing_url: String,
    max_retries: u32,
    backoff: Duration,
}

impl HereRouteOracle {
    /// Crear el cliente a partir de la configuración; HERE_API_KEY es obligatoria
    pub fn from_config(config: &EnvironmentConfig) -> AppResult<Self> {
        let api_key = config.here_api_key.clone().ok_or_else(|| {
            AppError::Configuration("HERE_API_KEY environment variable is not set".to_string())
        })?;

        let client = Client::builder()
            .timeout(config.route_timeout)
            .user_agent("DeliveryBooking/1.0")
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        info!("🗺️ HERE routing configurado ({})", config.here_routing_url);
        Ok(Self::with_client(
            client,
            api_key,
            config.here_routing_url.clone(),
            config.route_max_retries,
            Duration::from_millis(250),
        ))
    }

    pub fn with_client(
        client: Client,
        api_key: String,
        routing_url: String,
        max_retries: u32,
        backoff: Duration,
    ) -> Self {
        Self {
            client,
            api_key,
            routing_url,
            max_retries,
            backoff,
        }
    }

    async fn request_once(&self, origin: &str, destination: &str) -> Result<Option<RouteResult>, AttemptError> {
        let response = self
            .client
            .get(&self.routing_url)
            .header("Accept", "application/json")
            .query(&[
                ("apikey", self.api_key.as_str()),
                ("transportMode", "car"),
                ("origin", origin),
                ("destination", destination),
                ("return", "polyline,summary"),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AttemptError::Transient(format!("timeout: {}", e))
                } else {
                    AttemptError::Transient(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        debug!("📡 HERE routing response status: {}", status);

        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(AttemptError::Transient(format!("HERE API error {}: {}", status, body)));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("❌ HERE Routing API error: {} - {}", status, body);
            let err = match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Configuration(
                    "Invalid HERE API key or insufficient permissions".to_string(),
                ),
                StatusCode::BAD_REQUEST => {
                    AppError::BadRequest("Invalid route parameters - check coordinates format".to_string())
                }
                _ => AppError::RouteUnavailable(format!("HERE API error {}", status)),
            };
            return Err(AttemptError::Fatal(err));
        }

        let body: HereRouteResponse = response.json().await.map_err(|e| {
            AttemptError::Fatal(AppError::RouteUnavailable(format!(
                "Failed to parse HERE routing response: {}",
                e
            )))
        })?;

        Ok(body
            .routes
            .into_iter()
            .next()
            .and_then(|route| route.sections.into_iter().next())
            .map(|section| RouteResult {
                distance_meters: section.summary.length,
                duration_seconds: section.summary.duration,
                polyline: section.polyline,
            }))
    }
}

#[async_trait]
impl RouteOracle for HereRouteOracle {
    async fn calculate_route(&self, origin: &str, destination: &str) -> AppResult<Option<RouteResult>> {
        let (origin, destination) = (origin.trim(), destination.trim());
        if validate_coordinate_pair(origin).is_err() || validate_coordinate_pair(destination).is_err() {
            return Err(AppError::BadRequest(
                "Coordinates must be in format \"latitude,longitude\"".to_string(),
            ));
        }

        info!("🗺️ Calculando ruta {} → {}", origin, destination);

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.request_once(origin, destination).await {
                Ok(route) => {
                    match &route {
                        Some(r) => info!(
                            "✅ Ruta calculada: {} m, {} s (intento {})",
                            r.distance_meters, r.duration_seconds, attempt
                        ),
                        None => warn!("⚠️ HERE no encontró ruta {} → {}", origin, destination),
                    }
                    return Ok(route);
                }
                Err(AttemptError::Transient(msg)) if attempt <= self.max_retries => {
                    warn!(
                        "🔁 Fallo transitorio en HERE (intento {}/{}): {}",
                        attempt,
                        self.max_retries + 1,
                        msg
                    );
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Err(AttemptError::Transient(msg)) => {
                    error!("❌ HERE routing no disponible tras {} intentos: {}", attempt, msg);
                    return Err(AppError::RouteUnavailable(msg));
                }
                Err(AttemptError::Fatal(err)) => return Err(err),
            }
        }
    }
}
