//! Modelo de Estimate
//!
//! Cotización persistida. Inmutable desde su creación salvo el estado,
//! que avanza cuando se guarda o se reserva.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

use crate::services::pricing_service::PriceBreakdown;

/// Estado de la cotización - mapea al ENUM estimate_status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "estimate_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EstimateStatus {
    Calculated,
    Saved,
    Booked,
}

impl EstimateStatus {
    pub fn can_transition_to(self, next: EstimateStatus) -> bool {
        matches!(
            (self, next),
            (EstimateStatus::Calculated, EstimateStatus::Saved)
                | (EstimateStatus::Calculated, EstimateStatus::Booked)
                | (EstimateStatus::Saved, EstimateStatus::Booked)
        )
    }
}

/// Estimate principal - mapea a la tabla estimates
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Estimate {
    pub id: Uuid,
    pub pickup_address: String,
    pub pickup_coordinates: String,
    pub destination_address: String,
    pub destination_coordinates: String,
    pub vehicle_type_id: String,
    pub distance_meters: i64,
    pub route_duration_seconds: i64,
    pub estimated_duration_minutes: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub base_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub labor_cost: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub mileage_cost: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub booking_fee: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    pub status: EstimateStatus,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Datos para insertar una nueva cotización
#[derive(Debug, Clone)]
pub struct NewEstimate {
    pub pickup_address: String,
    pub pickup_coordinates: String,
    pub destination_address: String,
    pub destination_coordinates: String,
    pub vehicle_type_id: String,
    pub distance_meters: u64,
    pub route_duration_seconds: u64,
    pub estimated_duration_minutes: u32,
    pub pricing: PriceBreakdown,
    pub user_id: Option<Uuid>,
}

impl NewEstimate {
    /// Construir la fila con estado CALCULATED
    pub fn into_estimate(self, id: Uuid, now: DateTime<Utc>) -> Estimate {
        Estimate {
            id,
            pickup_address: self.pickup_address,
            pickup_coordinates: self.pickup_coordinates,
            destination_address: self.destination_address,
            destination_coordinates: self.destination_coordinates,
            vehicle_type_id: self.vehicle_type_id,
            distance_meters: i64::try_from(self.distance_meters).unwrap_or(i64::MAX),
            route_duration_seconds: i64::try_from(self.route_duration_seconds).unwrap_or(i64::MAX),
            estimated_duration_minutes: i32::try_from(self.estimated_duration_minutes).unwrap_or(i32::MAX),
            base_price: self.pricing.base_price,
            labor_cost: self.pricing.labor_cost,
            mileage_cost: self.pricing.mileage_cost,
            booking_fee: self.pricing.booking_fee,
            total_price: self.pricing.total_price,
            status: EstimateStatus::Calculated,
            user_id: self.user_id,
            created_at: now,
            updated_at: now,
        }
    }
}
