//! Modelo de VehicleTier
//!
//! Tipos de vehículo con sus coeficientes de tarifa. Datos de referencia:
//! solo se crean por seeding administrativo, nunca desde una request.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::utils::errors::{AppError, AppResult};
use crate::utils::validation::validate_non_negative;

/// Tier de vehículo - mapea a la tabla vehicle_types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct VehicleTier {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub base_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub per_minute: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub per_km: Decimal,
    pub max_weight: i32,
    pub dimensions: Option<String>,
    pub image_url: Option<String>,
    pub is_active: bool,
}

impl VehicleTier {
    /// Todas las tarifas deben ser no negativas
    pub fn validate_rates(&self) -> AppResult<()> {
        for (field, value) in [
            ("base_price", self.base_price),
            ("per_minute", self.per_minute),
            ("per_km", self.per_km),
        ] {
            validate_non_negative(value).map_err(|_| {
                AppError::Configuration(format!(
                    "Vehicle type '{}' has negative {}: {}",
                    self.id, field, value
                ))
            })?;
        }
        if self.max_weight < 0 {
            return Err(AppError::Configuration(format!(
                "Vehicle type '{}' has negative max weight",
                self.id
            )));
        }
        Ok(())
    }

    /// Flota por defecto (misma que el seed de migraciones)
    pub fn default_fleet() -> Vec<VehicleTier> {
        vec![
            tier("pickup", "Pickup", "Perfect for smaller items", (4000, 150, 200), 500, "6ft x 4ft x 2ft", "pickup_truck"),
            tier("van", "Van", "Good for medium loads", (5000, 175, 225), 1000, "8ft x 5ft x 4ft", "van_truck"),
            tier("xl", "XL Truck", "Ideal for larger items", (6500, 200, 250), 2000, "10ft x 6ft x 3ft", "xl_truck"),
            tier("box", "Box Truck", "For full moves", (8500, 250, 300), 4000, "12ft x 7ft x 6ft", "box_truck"),
        ]
    }
}

fn tier(
    id: &str,
    display_name: &str,
    description: &str,
    (base_cents, per_minute_cents, per_km_cents): (i64, i64, i64),
    max_weight: i32,
    dimensions: &str,
    image: &str,
) -> VehicleTier {
    VehicleTier {
        id: id.to_string(),
        name: id.to_string(),
        display_name: display_name.to_string(),
        description: Some(description.to_string()),
        base_price: Decimal::new(base_cents, 2),
        per_minute: Decimal::new(per_minute_cents, 2),
        per_km: Decimal::new(per_km_cents, 2),
        max_weight,
        dimensions: Some(dimensions.to_string()),
        image_url: Some(format!("/images/illustrations/{}.svg", image)),
        is_active: true,
    }
}
