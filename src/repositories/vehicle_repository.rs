//! Catálogo de vehículos
//!
//! Solo lectura: los tiers se cargan por seeding, nunca desde una request.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use crate::models::VehicleTier;
use crate::utils::errors::{not_found_error, AppResult};

#[async_trait]
pub trait VehicleCatalog: Send + Sync {
    /// Tier activo por id; `NotFound` si no existe o está inactivo
    async fn get_tier_by_id(&self, id: &str) -> AppResult<VehicleTier>;

    /// Tiers activos ordenados por precio base ascendente
    async fn list_active_tiers(&self) -> AppResult<Vec<VehicleTier>>;
}

pub struct VehicleRepository {
    pool: PgPool,
}

impl VehicleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VehicleCatalog for VehicleRepository {
    async fn get_tier_by_id(&self, id: &str) -> AppResult<VehicleTier> {
        let tier = sqlx::query_as::<_, VehicleTier>(
            "SELECT * FROM vehicle_types WHERE id = $1 AND is_active = TRUE",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        tier.ok_or_else(|| not_found_error("Vehicle type", id))
    }

    async fn list_active_tiers(&self) -> AppResult<Vec<VehicleTier>> {
        let tiers = sqlx::query_as::<_, VehicleTier>(
            "SELECT * FROM vehicle_types WHERE is_active = TRUE ORDER BY base_price ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        debug!("🚚 {} tiers de vehículo activos", tiers.len());
        Ok(tiers)
    }
}

/// Catálogo en memoria (desarrollo y tests)
pub struct InMemoryVehicleCatalog {
    tiers: Vec<VehicleTier>,
}

impl InMemoryVehicleCatalog {
    pub fn new(tiers: Vec<VehicleTier>) -> Self {
        Self { tiers }
    }

    pub fn with_default_fleet() -> Self {
        Self::new(VehicleTier::default_fleet())
    }
}

#[async_trait]
impl VehicleCatalog for InMemoryVehicleCatalog {
    async fn get_tier_by_id(&self, id: &str) -> AppResult<VehicleTier> {
        self.tiers
            .iter()
            .find(|t| t.id == id && t.is_active)
            .cloned()
            .ok_or_else(|| not_found_error("Vehicle type", id))
    }

    async fn list_active_tiers(&self) -> AppResult<Vec<VehicleTier>> {
        let mut tiers: Vec<VehicleTier> = self.tiers.iter().filter(|t| t.is_active).cloned().collect();
        tiers.sort_by(|a, b| a.base_price.cmp(&b.base_price).then_with(|| a.id.cmp(&b.id)));
        Ok(tiers)
    }
}
