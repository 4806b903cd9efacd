use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::SlotHold;
use crate::services::{BookingChanges, CreateBooking};
use crate::utils::validation::{validate_date, validate_not_empty, validate_phone};

const MAX_PHOTO_URLS: usize = 10;

/// Fotos opcionales: como máximo 10 URLs http(s)
fn validate_photo_urls(urls: &[String]) -> Result<(), ValidationError> {
    if urls.len() > MAX_PHOTO_URLS {
        let mut error = ValidationError::new("photo_urls_count");
        error.add_param("max".into(), &MAX_PHOTO_URLS);
        return Err(error);
    }
    if let Some(bad) = urls
        .iter()
        .find(|url| !(url.starts_with("http://") || url.starts_with("https://")))
    {
        let mut error = ValidationError::new("photo_url");
        error.add_param("value".into(), bad);
        return Err(error);
    }
    Ok(())
}

fn validate_date_param(value: &str) -> Result<(), ValidationError> {
    validate_date(value).map(|_| ())
}

// Request para crear una reserva
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub estimate_id: Uuid,
    #[validate(custom = "validate_not_empty", length(max = 200))]
    pub customer_name: String,
    #[validate(email)]
    pub customer_email: String,
    #[validate(custom = "validate_phone")]
    pub customer_phone: String,
    pub scheduled_at: DateTime<Utc>,
    #[validate(length(max = 2000))]
    pub items_description: Option<String>,
    #[serde(default)]
    #[validate(custom = "validate_photo_urls")]
    pub photo_urls: Vec<String>,
    #[validate(length(max = 2000))]
    pub special_instructions: Option<String>,
    pub user_id: Option<Uuid>,
}

impl From<CreateBookingRequest> for CreateBooking {
    fn from(request: CreateBookingRequest) -> Self {
        Self {
            estimate_id: request.estimate_id,
            customer_name: request.customer_name.trim().to_string(),
            customer_email: request.customer_email.trim().to_lowercase(),
            customer_phone: request.customer_phone,
            scheduled_at: request.scheduled_at,
            items_description: request.items_description,
            photo_urls: request.photo_urls,
            special_instructions: request.special_instructions,
            user_id: request.user_id,
        }
    }
}

// Request para actualizar una reserva (todos los campos opcionales)
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookingRequest {
    #[validate(custom = "validate_not_empty", length(max = 200))]
    pub customer_name: Option<String>,
    #[validate(email)]
    pub customer_email: Option<String>,
    #[validate(custom = "validate_phone")]
    pub customer_phone: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    #[validate(length(max = 2000))]
    pub items_description: Option<String>,
    #[validate(custom = "validate_photo_urls")]
    pub photo_urls: Option<Vec<String>>,
    #[validate(length(max = 2000))]
    pub special_instructions: Option<String>,
}

impl From<UpdateBookingRequest> for BookingChanges {
    fn from(request: UpdateBookingRequest) -> Self {
        Self {
            customer_name: request.customer_name.map(|name| name.trim().to_string()),
            customer_email: request.customer_email.map(|email| email.trim().to_lowercase()),
            customer_phone: request.customer_phone,
            scheduled_at: request.scheduled_at,
            items_description: request.items_description,
            photo_urls: request.photo_urls,
            special_instructions: request.special_instructions,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RateBookingRequest {
    #[validate(range(min = 1, max = 5))]
    pub rating: i16,
    #[validate(length(max = 2000))]
    pub review: Option<String>,
}

// Hold temporal de franja durante el checkout
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveSlotRequest {
    pub scheduled_at: DateTime<Utc>,
    pub estimate_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotHoldResponse {
    pub reservation_id: Uuid,
    pub vehicle_type: String,
    pub slot_start: DateTime<Utc>,
    pub estimate_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl From<SlotHold> for SlotHoldResponse {
    fn from(hold: SlotHold) -> Self {
        Self {
            reservation_id: hold.reservation_id,
            vehicle_type: hold.vehicle_type_id,
            slot_start: hold.slot_start,
            estimate_id: hold.estimate_id,
            expires_at: hold.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReleaseSlotResponse {
    pub released: bool,
}

// Query de disponibilidad: ?date=YYYY-MM-DD&vehicleType=&serviceArea=
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    #[validate(custom = "validate_date_param")]
    pub date: String,
    pub vehicle_type: Option<String>,
    pub service_area: Option<String>,
}

// Query de horas ocupadas: ?date=YYYY-MM-DD&serviceArea=
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BusyTimesQuery {
    #[validate(custom = "validate_date_param")]
    pub date: String,
    pub service_area: Option<String>,
}

/// Fecha ya validada de un query
pub fn parse_query_date(value: &str) -> Option<NaiveDate> {
    validate_date(value).ok()
}

/// Filtros vacíos (`?vehicleType=`) equivalen a no filtrar
pub fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
