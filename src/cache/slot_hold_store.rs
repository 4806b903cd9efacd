//! Holds temporales de franjas
//!
//! Un hold es un lease con expiración sobre (tier, slot_start), propiedad de
//! una cotización mientras termina el checkout.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::redis_client::RedisClient;
use crate::models::SlotHold;
use crate::utils::errors::{slot_conflict_error, AppResult};

#[async_trait]
pub trait SlotHoldStore: Send + Sync {
    /// Tomar o refrescar el hold; `Conflict` si otra cotización lo tiene
    async fn acquire(&self, hold: SlotHold, ttl: Duration) -> AppResult<SlotHold>;

    /// Hold vigente sobre la franja, si lo hay
    async fn current(&self, vehicle_type_id: &str, slot_start: DateTime<Utc>) -> AppResult<Option<SlotHold>>;

    /// Liberar el hold si pertenece a `estimate_id`
    async fn release(&self, vehicle_type_id: &str, slot_start: DateTime<Utc>, estimate_id: Uuid) -> AppResult<bool>;
}

fn hold_identifier(vehicle_type_id: &str, slot_start: DateTime<Utc>) -> String {
    format!("{}:{}", vehicle_type_id, slot_start.timestamp())
}

/// Holds en Redis (SET NX EX), compartidos entre procesos
pub struct RedisSlotHoldStore {
    redis: RedisClient,
}

impl RedisSlotHoldStore {
    pub fn new(redis: RedisClient) -> Self {
        Self { redis }
    }

    fn key(&self, vehicle_type_id: &str, slot_start: DateTime<Utc>) -> String {
        self.redis
            .make_key("slot_hold", &hold_identifier(vehicle_type_id, slot_start))
    }
}

#[async_trait]
impl SlotHoldStore for RedisSlotHoldStore {
    async fn acquire(&self, hold: SlotHold, ttl: Duration) -> AppResult<SlotHold> {
        let key = self.key(&hold.vehicle_type_id, hold.slot_start);
        let ttl_secs = ttl.as_secs().max(1);

        // Dos intentos: el hold existente puede expirar entre SET y GET
        for _ in 0..2 {
            if self.redis.set_if_absent(&key, &hold, ttl_secs).await? {
                info!("⏳ Hold creado en Redis: {}", key);
                return Ok(hold);
            }

            match self.redis.get::<SlotHold>(&key).await? {
                Some(existing) if existing.estimate_id == hold.estimate_id => {
                    self.redis.set(&key, &hold, ttl_secs).await?;
                    debug!("🔄 Hold refrescado: {}", key);
                    return Ok(hold);
                }
                Some(_) => return Err(slot_conflict_error(&hold.vehicle_type_id, hold.slot_start)),
                None => continue,
            }
        }

        Err(slot_conflict_error(&hold.vehicle_type_id, hold.slot_start))
    }

    async fn current(&self, vehicle_type_id: &str, slot_start: DateTime<Utc>) -> AppResult<Option<SlotHold>> {
        let hold = self
            .redis
            .get::<SlotHold>(&self.key(vehicle_type_id, slot_start))
            .await?;
        Ok(hold.filter(|h| !h.is_expired(Utc::now())))
    }

    async fn release(&self, vehicle_type_id: &str, slot_start: DateTime<Utc>, estimate_id: Uuid) -> AppResult<bool> {
        self.redis
            .delete_if_owner(
                &self.key(vehicle_type_id, slot_start),
                "estimateId",
                &estimate_id.to_string(),
            )
            .await
    }
}

/// Holds en memoria del proceso (desarrollo y tests)
#[derive(Default)]
pub struct InMemorySlotHoldStore {
    holds: Mutex<HashMap<String, SlotHold>>,
}

impl InMemorySlotHoldStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SlotHoldStore for InMemorySlotHoldStore {
    async fn acquire(&self, hold: SlotHold, _ttl: Duration) -> AppResult<SlotHold> {
        let now = Utc::now();
        let mut holds = self.holds.lock().await;
        holds.retain(|_, h| !h.is_expired(now));

        let key = hold_identifier(&hold.vehicle_type_id, hold.slot_start);
        if let Some(existing) = holds.get(&key) {
            if existing.estimate_id != hold.estimate_id {
                return Err(slot_conflict_error(&hold.vehicle_type_id, hold.slot_start));
            }
        }

        holds.insert(key, hold.clone());
        Ok(hold)
    }

    async fn current(&self, vehicle_type_id: &str, slot_start: DateTime<Utc>) -> AppResult<Option<SlotHold>> {
        let holds = self.holds.lock().await;
        Ok(holds
            .get(&hold_identifier(vehicle_type_id, slot_start))
            .filter(|h| !h.is_expired(Utc::now()))
            .cloned())
    }

    async fn release(&self, vehicle_type_id: &str, slot_start: DateTime<Utc>, estimate_id: Uuid) -> AppResult<bool> {
        let mut holds = self.holds.lock().await;
        let key = hold_identifier(vehicle_type_id, slot_start);
        match holds.get(&key) {
            Some(h) if h.estimate_id == estimate_id => {
                holds.remove(&key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
