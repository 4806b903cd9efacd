//! Sistema de manejo de errores
//!
//! Este módulo define todos los tipos de errores del sistema
//! y su conversión a respuestas HTTP apropiadas.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Errores principales de la aplicación
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {message}")]
    Conflict {
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Route unavailable: {0}")]
    RouteUnavailable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Respuesta de error para la API
#[derive(Debug, serde::Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl AppError {
    /// Código HTTP asociado a cada variante
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Configuration(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::RouteUnavailable(_) | AppError::Cache(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Indica si el error es un conflicto de franja horaria
    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict { .. })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = match self {
            AppError::Database(e) => {
                error!("❌ Database error: {}", e);
                ErrorResponse {
                    error: "Database Error".to_string(),
                    message: "An error occurred while accessing the database".to_string(),
                    details: Some(json!({ "sql_error": e.to_string() })),
                    code: Some("DB_ERROR".to_string()),
                }
            }

            AppError::Validation(e) => {
                warn!("⚠️ Validation error: {}", e);
                ErrorResponse {
                    error: "Validation Error".to_string(),
                    message: "The provided data is invalid".to_string(),
                    details: Some(json!(e)),
                    code: Some("VALIDATION_ERROR".to_string()),
                }
            }

            AppError::NotFound(msg) => {
                warn!("🔍 Resource not found: {}", msg);
                ErrorResponse {
                    error: "Not Found".to_string(),
                    message: msg,
                    details: None,
                    code: Some("NOT_FOUND".to_string()),
                }
            }

            AppError::Conflict { message, details } => {
                warn!("⛔ Conflict: {} {:?}", message, details);
                let code = if details.is_some() { "SLOT_CONFLICT" } else { "CONFLICT" };
                ErrorResponse {
                    error: "Conflict".to_string(),
                    message,
                    details,
                    code: Some(code.to_string()),
                }
            }

            AppError::BadRequest(msg) => {
                warn!("⚠️ Bad request: {}", msg);
                ErrorResponse {
                    error: "Bad Request".to_string(),
                    message: msg,
                    details: None,
                    code: Some("BAD_REQUEST".to_string()),
                }
            }

            AppError::RouteUnavailable(msg) => {
                error!("🗺️ Route unavailable: {}", msg);
                ErrorResponse {
                    error: "Service Unavailable".to_string(),
                    message: "Route calculation is currently unavailable, please retry later".to_string(),
                    details: Some(json!({ "route_error": msg })),
                    code: Some("ROUTE_UNAVAILABLE".to_string()),
                }
            }

            AppError::Configuration(msg) => {
                error!("❌ Configuration error: {}", msg);
                ErrorResponse {
                    error: "Internal Server Error".to_string(),
                    message: "The service is misconfigured".to_string(),
                    details: Some(json!({ "configuration_error": msg })),
                    code: Some("CONFIGURATION_ERROR".to_string()),
                }
            }

            AppError::Cache(msg) => {
                error!("❌ Cache error: {}", msg);
                ErrorResponse {
                    error: "Service Unavailable".to_string(),
                    message: "Slot reservation storage is unavailable".to_string(),
                    details: Some(json!({ "cache_error": msg })),
                    code: Some("CACHE_ERROR".to_string()),
                }
            }

            AppError::Internal(msg) => {
                error!("❌ Internal error: {}", msg);
                ErrorResponse {
                    error: "Internal Server Error".to_string(),
                    message: "An unexpected error occurred".to_string(),
                    details: Some(json!({ "internal_error": msg })),
                    code: Some("INTERNAL_ERROR".to_string()),
                }
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Resultado tipado para operaciones que pueden fallar
pub type AppResult<T> = Result<T, AppError>;

/// Función helper para crear errores de recurso no encontrado
pub fn not_found_error(resource: &str, id: &str) -> AppError {
    AppError::NotFound(format!("{} with id '{}' not found", resource, id))
}

/// Función helper para crear errores de conflicto de franja horaria
pub fn slot_conflict_error(vehicle_type: &str, slot_start: DateTime<Utc>) -> AppError {
    AppError::Conflict {
        message: format!(
            "Time slot starting at {} is not available for vehicle type '{}'",
            slot_start.to_rfc3339(),
            vehicle_type
        ),
        details: Some(json!({
            "vehicleType": vehicle_type,
            "slotStart": slot_start.to_rfc3339(),
        })),
    }
}

/// La fila cambió entre la lectura y la escritura
pub fn stale_booking_error(id: uuid::Uuid) -> AppError {
    AppError::Conflict {
        message: format!("Booking {} was modified concurrently, reload and retry", id),
        details: None,
    }
}

/// Función helper para crear errores de solicitud incorrecta
pub fn bad_request_error(message: &str) -> AppError {
    AppError::BadRequest(message.to_string())
}

/// Traduce violaciones de índice único a conflictos de franja
pub fn map_unique_violation(e: sqlx::Error, vehicle_type: &str, slot_start: DateTime<Utc>) -> AppError {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            slot_conflict_error(vehicle_type, slot_start)
        }
        _ => AppError::Database(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::BadRequest("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::RouteUnavailable("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::Configuration("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_slot_conflict_carries_context() {
        let slot = Utc.with_ymd_and_hms(2025, 6, 1, 14, 0, 0).unwrap();
        let err = slot_conflict_error("van", slot);
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        match err {
            AppError::Conflict { details: Some(details), .. } => {
                assert_eq!(details["vehicleType"], "van");
                assert_eq!(details["slotStart"], slot.to_rfc3339());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
