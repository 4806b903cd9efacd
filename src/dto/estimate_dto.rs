use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

use crate::models::{EstimateStatus, Location, RouteResult, VehicleTier};
use crate::services::{EstimateQuote, PriceBreakdown};
use crate::utils::money::{format_distance, format_duration, round_currency};
use crate::utils::validation::{validate_coordinate_pair, validate_not_empty};

// Request para calcular una cotización
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CalculateEstimateRequest {
    #[validate]
    pub pickup: Location,
    #[validate]
    pub destination: Location,
    #[validate(custom = "validate_not_empty", length(max = 50))]
    pub vehicle_type: String,
    #[validate(range(min = 1, max = 1440))]
    pub estimated_duration: Option<u32>,
    pub user_id: Option<Uuid>,
}

// Request de ruta directa entre dos pares "lat,lng"
#[derive(Debug, Deserialize, Validate)]
pub struct RouteRequest {
    #[validate(custom = "validate_coordinate_pair")]
    pub origin: String,
    #[validate(custom = "validate_coordinate_pair")]
    pub destination: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub distance_meters: u64,
    pub duration_seconds: u64,
    pub distance: String,
    pub duration: String,
    pub polyline: String,
}

impl From<&RouteResult> for RouteSummary {
    fn from(route: &RouteResult) -> Self {
        Self {
            distance_meters: route.distance_meters,
            duration_seconds: route.duration_seconds,
            distance: format_distance(route.distance_meters),
            duration: format_duration(route.duration_seconds),
            polyline: route.polyline.clone(),
        }
    }
}

// Precio para presentación: montos redondeados a 2 decimales
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingResponse {
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
    pub breakdown: BTreeMap<String, String>,
}

impl From<&PriceBreakdown> for PricingResponse {
    fn from(pricing: &PriceBreakdown) -> Self {
        Self {
            base_price: round_currency(pricing.base_price),
            labor_cost: round_currency(pricing.labor_cost),
            mileage_cost: round_currency(pricing.mileage_cost),
            booking_fee: round_currency(pricing.booking_fee),
            total_price: round_currency(pricing.total_price),
            breakdown: pricing.breakdown.clone(),
        }
    }
}

// Response de cotización calculada
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateResponse {
    pub id: Uuid,
    pub status: EstimateStatus,
    pub pickup: Location,
    pub destination: Location,
    pub vehicle: VehicleTier,
    pub route: RouteSummary,
    pub pricing: PricingResponse,
    pub estimated_duration: u32,
    pub created_at: DateTime<Utc>,
}

impl From<EstimateQuote> for EstimateResponse {
    fn from(quote: EstimateQuote) -> Self {
        Self {
            id: quote.estimate.id,
            status: quote.estimate.status,
            route: RouteSummary::from(&quote.route),
            pricing: PricingResponse::from(&quote.pricing),
            estimated_duration: u32::try_from(quote.estimate.estimated_duration_minutes).unwrap_or_default(),
            created_at: quote.estimate.created_at,
            pickup: quote.pickup,
            destination: quote.destination,
            vehicle: quote.vehicle,
        }
    }
}
