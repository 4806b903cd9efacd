//! Repositorio de cotizaciones

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Estimate, EstimateStatus, NewEstimate};
use crate::utils::errors::{not_found_error, AppResult};

#[async_trait]
pub trait EstimateStore: Send + Sync {
    async fn insert(&self, estimate: NewEstimate) -> AppResult<Estimate>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Estimate>>;

    async fn update_status(&self, id: Uuid, status: EstimateStatus) -> AppResult<Estimate>;

    /// Cotizaciones de un usuario, más recientes primero
    async fn find_by_user(&self, user_id: Uuid) -> AppResult<Vec<Estimate>>;
}

pub struct EstimateRepository {
    pool: PgPool,
}

impl EstimateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EstimateStore for EstimateRepository {
    async fn insert(&self, estimate: NewEstimate) -> AppResult<Estimate> {
        let row = estimate.into_estimate(Uuid::new_v4(), Utc::now());

        let estimate = sqlx::query_as::<_, Estimate>(
            r#"
            INSERT INTO estimates (
                id, pickup_address, pickup_coordinates, destination_address, destination_coordinates,
                vehicle_type_id, distance_meters, route_duration_seconds, estimated_duration_minutes,
                base_price, labor_cost, mileage_cost, booking_fee, total_price,
                status, user_id, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING *
            "#,
        )
        .bind(row.id)
        .bind(&row.pickup_address)
        .bind(&row.pickup_coordinates)
        .bind(&row.destination_address)
        .bind(&row.destination_coordinates)
        .bind(&row.vehicle_type_id)
        .bind(row.distance_meters)
        .bind(row.route_duration_seconds)
        .bind(row.estimated_duration_minutes)
        .bind(row.base_price)
        .bind(row.labor_cost)
        .bind(row.mileage_cost)
        .bind(row.booking_fee)
        .bind(row.total_price)
        .bind(row.status)
        .bind(row.user_id)
        .bind(row.created_at)
        .bind(row.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(estimate)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Estimate>> {
        let estimate = sqlx::query_as::<_, Estimate>("SELECT * FROM estimates WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(estimate)
    }

    async fn update_status(&self, id: Uuid, status: EstimateStatus) -> AppResult<Estimate> {
        let estimate = sqlx::query_as::<_, Estimate>(
            "UPDATE estimates SET status = $2, updated_at = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        estimate.ok_or_else(|| not_found_error("Estimate", &id.to_string()))
    }

    async fn find_by_user(&self, user_id: Uuid) -> AppResult<Vec<Estimate>> {
        let estimates = sqlx::query_as::<_, Estimate>(
            "SELECT * FROM estimates WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(estimates)
    }
}

/// Store en memoria (desarrollo y tests)
#[derive(Default)]
pub struct InMemoryEstimateStore {
    estimates: Arc<RwLock<HashMap<Uuid, Estimate>>>,
}

impl InMemoryEstimateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EstimateStore for InMemoryEstimateStore {
    async fn insert(&self, estimate: NewEstimate) -> AppResult<Estimate> {
        let row = estimate.into_estimate(Uuid::new_v4(), Utc::now());
        self.estimates.write().await.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Estimate>> {
        Ok(self.estimates.read().await.get(&id).cloned())
    }

    async fn update_status(&self, id: Uuid, status: EstimateStatus) -> AppResult<Estimate> {
        let mut estimates = self.estimates.write().await;
        let estimate = estimates
            .get_mut(&id)
            .ok_or_else(|| not_found_error("Estimate", &id.to_string()))?;
        estimate.status = status;
        estimate.updated_at = Utc::now();
        Ok(estimate.clone())
    }

    async fn find_by_user(&self, user_id: Uuid) -> AppResult<Vec<Estimate>> {
        let mut estimates: Vec<Estimate> = self
            .estimates
            .read()
            .await
            .values()
            .filter(|e| e.user_id == Some(user_id))
            .cloned()
            .collect();
        estimates.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(estimates)
    }
}
