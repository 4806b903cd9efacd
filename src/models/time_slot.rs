//! Modelos de franjas horarias
//!
//! Se calculan en cada request a partir de las reservas activas; nunca se persisten.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Nivel de demanda de una hora
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DemandLevel {
    Low,
    Medium,
    High,
}

impl DemandLevel {
    /// `high` si count >= high, `medium` si count >= medium, si no `low`
    pub fn from_count(count: usize, medium_threshold: usize, high_threshold: usize) -> Self {
        if count >= high_threshold {
            DemandLevel::High
        } else if count >= medium_threshold {
            DemandLevel::Medium
        } else {
            DemandLevel::Low
        }
    }

    /// Multiplicador informativo; no se aplica al precio persistido
    pub fn surge_multiplier(self) -> f64 {
        match self {
            DemandLevel::High => 1.5,
            DemandLevel::Medium => 1.2,
            DemandLevel::Low => 1.0,
        }
    }
}

/// Franja de una hora dentro de la ventana operativa
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub time: DateTime<Utc>,
    pub hour: u32,
    pub available: bool,
    pub demand_level: DemandLevel,
    pub surge_multiplier: f64,
    pub booking_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    pub date: NaiveDate,
    pub slots: Vec<TimeSlot>,
    pub timezone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_area: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusyHour {
    pub hour: u32,
    pub booking_count: usize,
    pub surge_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusyTimesResponse {
    pub date: NaiveDate,
    pub busy_hours: Vec<BusyHour>,
    pub timezone: String,
}

/// Hold temporal de una franja mientras termina el checkout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotHold {
    pub reservation_id: Uuid,
    pub vehicle_type_id: String,
    pub slot_start: DateTime<Utc>,
    pub estimate_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl SlotHold {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
