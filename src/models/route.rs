//! Modelos de ubicación y resultado de ruta

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::utils::validation::validate_not_empty;

/// Coordenadas GPS
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct Coordinates {
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,
}

impl Coordinates {
    /// Formato "lat,lng" esperado por el proveedor de rutas
    pub fn to_pair_string(&self) -> String {
        format!("{},{}", self.lat, self.lng)
    }
}

/// Dirección + coordenadas de un extremo del trayecto
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Location {
    #[validate(custom = "validate_not_empty", length(max = 500))]
    pub address: String,
    #[validate]
    pub coordinates: Coordinates,
}

/// Resultado del proveedor de rutas. Nunca se persiste por sí mismo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResult {
    pub distance_meters: u64,
    pub duration_seconds: u64,
    pub polyline: String,
}
