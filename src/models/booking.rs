//! Modelo de Booking
//!
//! La reserva es dueña exclusiva de su estado de agenda. Nunca se borra:
//! cancelar es un cambio de estado.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use std::fmt;
use uuid::Uuid;

/// Estado de la reserva - mapea al ENUM booking_status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "booking_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    /// Estados que ocupan franja y cuentan para la demanda
    pub const ACTIVE: [BookingStatus; 3] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::InProgress,
    ];

    pub fn is_active(self) -> bool {
        Self::ACTIVE.contains(&self)
    }

    /// Una vez en ejecución o terminada, la reserva no se modifica
    pub fn is_locked(self) -> bool {
        matches!(self, BookingStatus::InProgress | BookingStatus::Completed)
    }

    /// Transiciones hacia adelante más cancelación desde PENDING/CONFIRMED
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Confirmed, BookingStatus::InProgress)
                | (BookingStatus::InProgress, BookingStatus::Completed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::Cancelled)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::InProgress => "IN_PROGRESS",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
        };
        f.write_str(label)
    }
}

/// Booking principal - mapea a la tabla bookings
///
/// `vehicle_type_id` se copia del estimate al crear, y `slot_start` es la hora
/// de reloj local truncada de `scheduled_at`; ambos alimentan el índice único
/// de franjas activas.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub estimate_id: Uuid,
    pub vehicle_type_id: String,
    pub user_id: Option<Uuid>,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub scheduled_at: DateTime<Utc>,
    pub slot_start: DateTime<Utc>,
    pub status: BookingStatus,
    pub items_description: Option<String>,
    pub photo_urls: Vec<String>,
    pub special_instructions: Option<String>,
    pub rating: Option<i16>,
    pub review: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Ocupa la franja (vehicle_type_id, slot_start)
    pub fn occupies(&self, vehicle_type_id: &str, slot_start: DateTime<Utc>) -> bool {
        self.status.is_active()
            && self.vehicle_type_id == vehicle_type_id
            && self.slot_start == slot_start
    }
}

/// Datos para insertar una nueva reserva (estado PENDING)
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub estimate_id: Uuid,
    pub vehicle_type_id: String,
    pub user_id: Option<Uuid>,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub scheduled_at: DateTime<Utc>,
    pub slot_start: DateTime<Utc>,
    pub items_description: Option<String>,
    pub photo_urls: Vec<String>,
    pub special_instructions: Option<String>,
}

impl NewBooking {
    pub fn into_booking(self, id: Uuid, now: DateTime<Utc>) -> Booking {
        Booking {
            id,
            estimate_id: self.estimate_id,
            vehicle_type_id: self.vehicle_type_id,
            user_id: self.user_id,
            customer_name: self.customer_name,
            customer_email: self.customer_email,
            customer_phone: self.customer_phone,
            scheduled_at: self.scheduled_at,
            slot_start: self.slot_start,
            status: BookingStatus::Pending,
            items_description: self.items_description,
            photo_urls: self.photo_urls,
            special_instructions: self.special_instructions,
            rating: None,
            review: None,
            created_at: now,
            updated_at: now,
        }
    }
}
