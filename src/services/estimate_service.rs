//! Servicio de cotizaciones
//!
//! Orquesta ruta → tier → precio → persistencia. Cada llamada crea una
//! cotización nueva; no hay deduplicación.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::pricing_service::{PriceBreakdown, PricingEngine};
use super::route_oracle::RouteOracle;
use crate::models::{Estimate, EstimateStatus, Location, NewEstimate, RouteResult, VehicleTier};
use crate::repositories::{EstimateStore, VehicleCatalog};
use crate::utils::errors::{not_found_error, AppError, AppResult};

pub const DEFAULT_ESTIMATED_DURATION_MINUTES: u32 = 30;

/// Cotización calculada junto con las entradas que la produjeron
#[derive(Debug, Clone)]
pub struct EstimateQuote {
    pub estimate: Estimate,
    pub pickup: Location,
    pub destination: Location,
    pub vehicle: VehicleTier,
    pub route: RouteResult,
    pub pricing: PriceBreakdown,
}

pub struct EstimateService {
    catalog: Arc<dyn VehicleCatalog>,
    estimates: Arc<dyn EstimateStore>,
    oracle: Arc<dyn RouteOracle>,
    pricing: PricingEngine,
}

impl EstimateService {
    pub fn new(
        catalog: Arc<dyn VehicleCatalog>,
        estimates: Arc<dyn EstimateStore>,
        oracle: Arc<dyn RouteOracle>,
        pricing: PricingEngine,
    ) -> Self {
        Self {
            catalog,
            estimates,
            oracle,
            pricing,
        }
    }

    pub async fn calculate_estimate(
        &self,
        pickup: Location,
        destination: Location,
        vehicle_type: &str,
        estimated_duration_minutes: Option<u32>,
        user_id: Option<Uuid>,
    ) -> AppResult<EstimateQuote> {
        let minutes = estimated_duration_minutes.unwrap_or(DEFAULT_ESTIMATED_DURATION_MINUTES);
        let origin = pickup.coordinates.to_pair_string();
        let target = destination.coordinates.to_pair_string();

        let route = self.calculate_route(&origin, &target).await?;
        let vehicle = self.catalog.get_tier_by_id(vehicle_type).await?;
        let pricing = self.pricing.calculate_price(&vehicle, &route, minutes)?;

        let estimate = self
            .estimates
            .insert(NewEstimate {
                pickup_address: pickup.address.clone(),
                pickup_coordinates: origin,
                destination_address: destination.address.clone(),
                destination_coordinates: target,
                vehicle_type_id: vehicle.id.clone(),
                distance_meters: route.distance_meters,
                route_duration_seconds: route.duration_seconds,
                estimated_duration_minutes: minutes,
                pricing: pricing.clone(),
                user_id,
            })
            .await?;

        info!(
            "🧾 Estimate {} creado: {} ({} m, {} min) = {}",
            estimate.id, vehicle.id, route.distance_meters, minutes, estimate.total_price
        );

        Ok(EstimateQuote {
            estimate,
            pickup,
            destination,
            vehicle,
            route,
            pricing,
        })
    }

    /// Ruta entre dos pares "lat,lng"; sin ruta → `RouteUnavailable`
    pub async fn calculate_route(&self, origin: &str, destination: &str) -> AppResult<RouteResult> {
        self.oracle
            .calculate_route(origin, destination)
            .await?
            .ok_or_else(|| {
                warn!("⚠️ Sin ruta entre {} y {}", origin, destination);
                AppError::RouteUnavailable(format!("No route found between {} and {}", origin, destination))
            })
    }

    pub async fn list_vehicles(&self) -> AppResult<Vec<VehicleTier>> {
        self.catalog.list_active_tiers().await
    }

    pub async fn get_estimate(&self, id: Uuid) -> AppResult<Estimate> {
        self.estimates
            .find_by_id(id)
            .await?
            .ok_or_else(|| not_found_error("Estimate", &id.to_string()))
    }

    pub async fn find_by_user(&self, user_id: Uuid) -> AppResult<Vec<Estimate>> {
        self.estimates.find_by_user(user_id).await
    }

    /// CALCULATED → SAVED; guardar dos veces no cambia nada
    pub async fn save_estimate(&self, id: Uuid) -> AppResult<Estimate> {
        let estimate = self.get_estimate(id).await?;
        match estimate.status {
            EstimateStatus::Saved => Ok(estimate),
            status if status.can_transition_to(EstimateStatus::Saved) => {
                info!("💾 Estimate {} guardado", id);
                self.estimates.update_status(id, EstimateStatus::Saved).await
            }
            status => Err(AppError::BadRequest(format!(
                "Estimate {} cannot be saved from status {:?}",
                id, status
            ))),
        }
    }

    /// Marcar la cotización como reservada si su estado lo permite
    pub async fn mark_booked(&self, estimate: &Estimate) -> AppResult<()> {
        if estimate.status.can_transition_to(EstimateStatus::Booked) {
            self.estimates
                .update_status(estimate.id, EstimateStatus::Booked)
                .await?;
        }
        Ok(())
    }
}
