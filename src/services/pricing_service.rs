//! Motor de precios
//!
//! Cálculo puro: (tier de vehículo, ruta, duración estimada) → desglose de precio.
//! Toda la aritmética monetaria se hace en `Decimal` con precisión completa;
//! el redondeo a 2 decimales solo ocurre al presentar.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::models::{RouteResult, VehicleTier};
use crate::utils::errors::{AppError, AppResult};
use crate::utils::money::format_currency;

/// Recargo fijo de reserva (6%)
pub fn booking_fee_rate() -> Decimal {
    Decimal::new(6, 2)
}

/// Desglose de precio de una cotización
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
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
    /// Líneas legibles, independientes de los campos numéricos
    pub breakdown: BTreeMap<String, String>,
}

impl PriceBreakdown {
    pub fn subtotal(&self) -> Decimal {
        self.base_price + self.labor_cost + self.mileage_cost
    }
}

/// Estrategias de precio disponibles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingStrategy {
    Standard,
    /// Reservada para reglas futuras; hoy delega en Standard
    Premium,
}

impl FromStr for PricingStrategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(PricingStrategy::Standard),
            "premium" => Ok(PricingStrategy::Premium),
            other => Err(AppError::Configuration(format!(
                "Unknown pricing strategy '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for PricingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PricingStrategy::Standard => f.write_str("standard"),
            PricingStrategy::Premium => f.write_str("premium"),
        }
    }
}

impl PricingStrategy {
    fn calculate(
        self,
        tier: &VehicleTier,
        route: &RouteResult,
        estimated_duration_minutes: u32,
    ) -> PriceBreakdown {
        match self {
            PricingStrategy::Standard | PricingStrategy::Premium => {
                standard_price(tier, route, estimated_duration_minutes)
            }
        }
    }
}

fn standard_price(tier: &VehicleTier, route: &RouteResult, estimated_duration_minutes: u32) -> PriceBreakdown {
    let distance_km = Decimal::from(route.distance_meters) / Decimal::from(1000);

    let base_price = tier.base_price;
    let labor_cost = Decimal::from(estimated_duration_minutes) * tier.per_minute;
    let mileage_cost = distance_km * tier.per_km;
    let subtotal = base_price + labor_cost + mileage_cost;
    let booking_fee = subtotal * booking_fee_rate();
    let total_price = subtotal + booking_fee;

    let mut breakdown = BTreeMap::new();
    breakdown.insert(
        "basePrice".to_string(),
        format!("Vehicle base rate: {}", format_currency(base_price)),
    );
    breakdown.insert(
        "laborCost".to_string(),
        format!("Labor ({} min): {}", estimated_duration_minutes, format_currency(labor_cost)),
    );
    breakdown.insert(
        "mileageCost".to_string(),
        format!(
            "Distance ({:.1} km): {}",
            distance_km.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero),
            format_currency(mileage_cost)
        ),
    );
    breakdown.insert(
        "bookingFee".to_string(),
        format!("Booking fee (6%): {}", format_currency(booking_fee)),
    );

    PriceBreakdown {
        base_price,
        labor_cost,
        mileage_cost,
        booking_fee,
        total_price,
        breakdown,
    }
}

/// Dispatcher de estrategias de precio
#[derive(Debug, Clone)]
pub struct PricingEngine {
    strategy: Option<PricingStrategy>,
}

impl PricingEngine {
    pub fn new(strategy: PricingStrategy) -> Self {
        Self { strategy: Some(strategy) }
    }

    /// Motor sin estrategia registrada; cada cálculo falla con `Configuration`
    pub fn unconfigured() -> Self {
        Self { strategy: None }
    }

    /// Construir a partir del nombre configurado ("standard" | "premium")
    pub fn from_name(name: &str) -> AppResult<Self> {
        Ok(Self::new(name.parse()?))
    }

    pub fn strategy(&self) -> Option<PricingStrategy> {
        self.strategy
    }

    /// Calcular el desglose de precio
    pub fn calculate_price(
        &self,
        tier: &VehicleTier,
        route: &RouteResult,
        estimated_duration_minutes: u32,
    ) -> AppResult<PriceBreakdown> {
        let strategy = self
            .strategy
            .ok_or_else(|| AppError::Configuration("Pricing strategy not found".to_string()))?;

        tier.validate_rates()?;

        let pricing = strategy.calculate(tier, route, estimated_duration_minutes);
        debug!(
            "💰 Precio calculado ({}) para '{}': {} ({} m, {} min)",
            strategy, tier.id, pricing.total_price, route.distance_meters, estimated_duration_minutes
        );
        Ok(pricing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn van() -> VehicleTier {
        VehicleTier::default_fleet()
            .into_iter()
            .find(|t| t.id == "van")
            .unwrap()
    }

    fn route(distance_meters: u64) -> RouteResult {
        RouteResult {
            distance_meters,
            duration_seconds: 900,
            polyline: String::new(),
        }
    }

    #[test]
    fn test_reference_fixture() {
        let engine = PricingEngine::new(PricingStrategy::Standard);
        let price = engine.calculate_price(&van(), &route(8500), 45).unwrap();

        assert_eq!(price.base_price, Decimal::new(50, 0));
        assert_eq!(price.labor_cost, Decimal::from_str("78.75").unwrap());
        assert_eq!(price.mileage_cost, Decimal::from_str("19.125").unwrap());
        assert_eq!(price.subtotal(), Decimal::from_str("147.875").unwrap());
        assert_eq!(price.booking_fee, Decimal::from_str("8.8725").unwrap());
        assert_eq!(price.total_price, Decimal::from_str("156.7475").unwrap());
        assert_eq!(format_currency(price.total_price), "$156.75");
    }

    #[test]
    fn test_breakdown_lines() {
        let engine = PricingEngine::new(PricingStrategy::Standard);
        let price = engine.calculate_price(&van(), &route(8500), 45).unwrap();

        assert_eq!(price.breakdown["basePrice"], "Vehicle base rate: $50.00");
        assert_eq!(price.breakdown["laborCost"], "Labor (45 min): $78.75");
        assert_eq!(price.breakdown["mileageCost"], "Distance (8.5 km): $19.13");
        assert_eq!(price.breakdown["bookingFee"], "Booking fee (6%): $8.87");
    }

    #[test]
    fn test_total_is_subtotal_plus_six_percent() {
        let engine = PricingEngine::new(PricingStrategy::Standard);
        let factor = Decimal::ONE + booking_fee_rate();

        for tier in VehicleTier::default_fleet() {
            for distance in [0u64, 1, 999, 8500, 123_457] {
                for minutes in [0u32, 1, 30, 45, 241] {
                    let price = engine.calculate_price(&tier, &route(distance), minutes).unwrap();
                    let expected = (tier.base_price
                        + tier.per_minute * Decimal::from(minutes)
                        + tier.per_km * Decimal::from(distance) / Decimal::from(1000))
                        * factor;

                    assert_eq!(price.total_price, expected);
                    assert_eq!(
                        price.total_price,
                        price.base_price + price.labor_cost + price.mileage_cost + price.booking_fee
                    );
                    assert_eq!(price.booking_fee, price.subtotal() * booking_fee_rate());
                }
            }
        }
    }

    #[test]
    fn test_premium_delegates_to_standard() {
        let standard = PricingEngine::new(PricingStrategy::Standard)
            .calculate_price(&van(), &route(12_000), 60)
            .unwrap();
        let premium = PricingEngine::new(PricingStrategy::Premium)
            .calculate_price(&van(), &route(12_000), 60)
            .unwrap();
        assert_eq!(standard, premium);
    }

    #[test]
    fn test_missing_strategy_is_configuration_error() {
        let result = PricingEngine::unconfigured().calculate_price(&van(), &route(1000), 30);
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_strategy_from_name() {
        assert_eq!(
            PricingEngine::from_name("Premium").unwrap().strategy(),
            Some(PricingStrategy::Premium)
        );
        assert!(matches!(
            PricingEngine::from_name("surge"),
            Err(AppError::Configuration(_))
        ));
    }
}
