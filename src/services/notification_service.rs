//! Notificaciones de reservas
//!
//! Fire-and-forget: el ciclo de vida nunca espera ni falla por una notificación.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::models::Booking;

/// Datos de contacto que acompañan a cada evento
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingNotification {
    pub booking_id: Uuid,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub scheduled_at: DateTime<Utc>,
}

impl From<&Booking> for BookingNotification {
    fn from(booking: &Booking) -> Self {
        Self {
            booking_id: booking.id,
            customer_name: booking.customer_name.clone(),
            customer_email: booking.customer_email.clone(),
            customer_phone: booking.customer_phone.clone(),
            scheduled_at: booking.scheduled_at,
        }
    }
}

pub trait NotificationDispatcher: Send + Sync {
    fn booking_created(&self, notification: &BookingNotification);
    fn booking_updated(&self, notification: &BookingNotification);
    fn booking_cancelled(&self, notification: &BookingNotification);
    fn booking_confirmed(&self, notification: &BookingNotification);
}

/// Dispatcher por defecto: eventos estructurados en tracing
#[derive(Debug, Default, Clone)]
pub struct LogNotificationDispatcher;

impl NotificationDispatcher for LogNotificationDispatcher {
    fn booking_created(&self, n: &BookingNotification) {
        info!(
            booking_id = %n.booking_id,
            email = %n.customer_email,
            phone = %n.customer_phone,
            scheduled_at = %n.scheduled_at,
            "📧 Reserva creada para {}",
            n.customer_name
        );
    }

    fn booking_updated(&self, n: &BookingNotification) {
        info!(
            booking_id = %n.booking_id,
            email = %n.customer_email,
            scheduled_at = %n.scheduled_at,
            "📧 Reserva actualizada para {}",
            n.customer_name
        );
    }

    fn booking_cancelled(&self, n: &BookingNotification) {
        info!(
            booking_id = %n.booking_id,
            email = %n.customer_email,
            phone = %n.customer_phone,
            "📧 Reserva cancelada para {}",
            n.customer_name
        );
    }

    fn booking_confirmed(&self, n: &BookingNotification) {
        info!(
            booking_id = %n.booking_id,
            email = %n.customer_email,
            scheduled_at = %n.scheduled_at,
            "📧 Reserva confirmada para {}",
            n.customer_name
        );
    }
}
