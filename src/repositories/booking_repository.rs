//! Repositorio de reservas
//!
//! El store es la autoridad sobre la unicidad de franjas: como máximo una
//! reserva activa (PENDING, CONFIRMED, IN_PROGRESS) por
//! (vehicle_type_id, slot_start). En Postgres lo garantiza un índice único
//! parcial; en memoria se comprueba bajo el lock de escritura.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Booking, NewBooking};
use crate::utils::errors::{
    map_unique_violation, not_found_error, slot_conflict_error, stale_booking_error, AppResult,
};

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Insertar en estado PENDING; `Conflict` si la franja ya está ocupada
    async fn insert(&self, booking: NewBooking) -> AppResult<Booking>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Booking>>;

    /// Reescribir la fila completa leída antes. Solo escribe si `updated_at` sigue
    /// igual al de la fila guardada; si no, o si la nueva franja choca con otra
    /// reserva activa, devuelve `Conflict`
    async fn update(&self, booking: &Booking) -> AppResult<Booking>;

    /// Reservas activas con `slot_start` en [start, end), opcionalmente de un tier
    async fn find_active_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        vehicle_type_id: Option<&str>,
    ) -> AppResult<Vec<Booking>>;

    /// Reserva activa que ocupa la franja, ignorando `exclude`
    async fn find_active_in_slot(
        &self,
        vehicle_type_id: &str,
        slot_start: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> AppResult<Option<Booking>>;

    /// Historial de un usuario, más recientes primero
    async fn find_by_user(&self, user_id: Uuid) -> AppResult<Vec<Booking>>;
}

pub struct BookingRepository {
    pool: PgPool,
}

impl BookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingStore for BookingRepository {
    async fn insert(&self, booking: NewBooking) -> AppResult<Booking> {
        let row = booking.into_booking(Uuid::new_v4(), Utc::now());

        sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (
                id, estimate_id, vehicle_type_id, user_id, customer_name, customer_email,
                customer_phone, scheduled_at, slot_start, status, items_description, photo_urls,
                special_instructions, rating, review, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING *
            "#,
        )
        .bind(row.id)
        .bind(row.estimate_id)
        .bind(&row.vehicle_type_id)
        .bind(row.user_id)
        .bind(&row.customer_name)
        .bind(&row.customer_email)
        .bind(&row.customer_phone)
        .bind(row.scheduled_at)
        .bind(row.slot_start)
        .bind(row.status)
        .bind(&row.items_description)
        .bind(&row.photo_urls)
        .bind(&row.special_instructions)
        .bind(row.rating)
        .bind(&row.review)
        .bind(row.created_at)
        .bind(row.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &row.vehicle_type_id, row.slot_start))
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(booking)
    }

    async fn update(&self, booking: &Booking) -> AppResult<Booking> {
        let updated = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings SET
                customer_name = $2,
                customer_email = $3,
                customer_phone = $4,
                scheduled_at = $5,
                slot_start = $6,
                status = $7,
                items_description = $8,
                photo_urls = $9,
                special_instructions = $10,
                rating = $11,
                review = $12,
                updated_at = GREATEST($13, updated_at + INTERVAL '1 microsecond')
            WHERE id = $1 AND updated_at = $14
            RETURNING *
            "#,
        )
        .bind(booking.id)
        .bind(&booking.customer_name)
        .bind(&booking.customer_email)
        .bind(&booking.customer_phone)
        .bind(booking.scheduled_at)
        .bind(booking.slot_start)
        .bind(booking.status)
        .bind(&booking.items_description)
        .bind(&booking.photo_urls)
        .bind(&booking.special_instructions)
        .bind(booking.rating)
        .bind(&booking.review)
        .bind(Utc::now())
        .bind(booking.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &booking.vehicle_type_id, booking.slot_start))?;

        match updated {
            Some(row) => Ok(row),
            None if self.find_by_id(booking.id).await?.is_some() => Err(stale_booking_error(booking.id)),
            None => Err(not_found_error("Booking", &booking.id.to_string())),
        }
    }

    async fn find_active_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        vehicle_type_id: Option<&str>,
    ) -> AppResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(
            r#"
            SELECT * FROM bookings
            WHERE slot_start >= $1 AND slot_start < $2
              AND status IN ('PENDING', 'CONFIRMED', 'IN_PROGRESS')
              AND ($3::TEXT IS NULL OR vehicle_type_id = $3)
            ORDER BY slot_start ASC
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(vehicle_type_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(bookings)
    }

    async fn find_active_in_slot(
        &self,
        vehicle_type_id: &str,
        slot_start: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> AppResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(
            r#"
            SELECT * FROM bookings
            WHERE vehicle_type_id = $1 AND slot_start = $2
              AND status IN ('PENDING', 'CONFIRMED', 'IN_PROGRESS')
              AND ($3::UUID IS NULL OR id <> $3)
            LIMIT 1
            "#,
        )
        .bind(vehicle_type_id)
        .bind(slot_start)
        .bind(exclude)
        .fetch_optional(&self.pool)
        .await?;

        Ok(booking)
    }

    async fn find_by_user(&self, user_id: Uuid) -> AppResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(bookings)
    }
}

/// Store en memoria (desarrollo y tests)
#[derive(Default)]
pub struct InMemoryBookingStore {
    bookings: Arc<RwLock<HashMap<Uuid, Booking>>>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn insert(&self, booking: NewBooking) -> AppResult<Booking> {
        let mut bookings = self.bookings.write().await;
        if bookings
            .values()
            .any(|b| b.occupies(&booking.vehicle_type_id, booking.slot_start))
        {
            return Err(slot_conflict_error(&booking.vehicle_type_id, booking.slot_start));
        }

        let row = booking.into_booking(Uuid::new_v4(), Utc::now());
        bookings.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Booking>> {
        Ok(self.bookings.read().await.get(&id).cloned())
    }

    async fn update(&self, booking: &Booking) -> AppResult<Booking> {
        let mut bookings = self.bookings.write().await;
        let stored_at = bookings
            .get(&booking.id)
            .map(|b| b.updated_at)
            .ok_or_else(|| not_found_error("Booking", &booking.id.to_string()))?;
        if stored_at != booking.updated_at {
            return Err(stale_booking_error(booking.id));
        }
        if booking.status.is_active()
            && bookings
                .values()
                .any(|b| b.id != booking.id && b.occupies(&booking.vehicle_type_id, booking.slot_start))
        {
            return Err(slot_conflict_error(&booking.vehicle_type_id, booking.slot_start));
        }

        let mut row = booking.clone();
        row.updated_at = Utc::now().max(stored_at + Duration::microseconds(1));
        bookings.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_active_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        vehicle_type_id: Option<&str>,
    ) -> AppResult<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.status.is_active() && b.slot_start >= start && b.slot_start < end)
            .filter(|b| vehicle_type_id.map_or(true, |vt| b.vehicle_type_id == vt))
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.slot_start);
        Ok(bookings)
    }

    async fn find_active_in_slot(
        &self,
        vehicle_type_id: &str,
        slot_start: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> AppResult<Option<Booking>> {
        Ok(self
            .bookings
            .read()
            .await
            .values()
            .find(|b| Some(b.id) != exclude && b.occupies(vehicle_type_id, slot_start))
            .cloned())
    }

    async fn find_by_user(&self, user_id: Uuid) -> AppResult<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.user_id == Some(user_id))
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }
}
