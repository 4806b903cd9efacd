//! Motor de disponibilidad de franjas horarias
//!
//! Las franjas se derivan en cada consulta de las reservas activas del día;
//! nada se persiste aparte de las reservas y los holds.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cache::SlotHoldStore;
use crate::config::{EffectiveWindow, SchedulingConfig};
use crate::models::{
    AvailabilityResponse, Booking, BusyHour, BusyTimesResponse, DemandLevel, SlotHold, TimeSlot,
};
use crate::repositories::BookingStore;
use crate::utils::errors::{slot_conflict_error, AppError, AppResult};

pub struct TimeSlotService {
    bookings: Arc<dyn BookingStore>,
    holds: Arc<dyn SlotHoldStore>,
    config: SchedulingConfig,
}

impl TimeSlotService {
    pub fn new(bookings: Arc<dyn BookingStore>, holds: Arc<dyn SlotHoldStore>, config: SchedulingConfig) -> Self {
        Self {
            bookings,
            holds,
            config,
        }
    }

    pub fn config(&self) -> &SchedulingConfig {
        &self.config
    }

    /// Ventana por defecto, usada para reservas
    pub fn default_window(&self) -> EffectiveWindow {
        self.config.resolve(None)
    }

    /// Inicio de la franja que contiene `at`
    pub fn slot_start_for(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        self.default_window().slot_start(at)
    }

    /// `BadRequest` si la hora local de `at` queda fuera de la ventana operativa
    pub fn ensure_within_window(&self, at: DateTime<Utc>) -> AppResult<()> {
        let window = self.default_window();
        let hour = window.local_hour(at);
        if !window.contains_hour(hour) {
            return Err(AppError::BadRequest(format!(
                "Scheduled hour {}:00 ({}) is outside operating hours {}:00-{}:00",
                hour, window.timezone, window.start_hour, window.end_hour
            )));
        }
        Ok(())
    }

    /// Reservas activas del día local, agrupadas por inicio de franja
    async fn bookings_by_slot(
        &self,
        window: &EffectiveWindow,
        date: NaiveDate,
    ) -> AppResult<BTreeMap<DateTime<Utc>, Vec<Booking>>> {
        let (start, end) = window.day_bounds(date);
        // Margen para reservas cuyo slot_start se calculó con otro offset
        let bookings = self
            .bookings
            .find_active_between(start - Duration::hours(1), end + Duration::hours(1), None)
            .await?;

        let mut by_slot: BTreeMap<DateTime<Utc>, Vec<Booking>> = BTreeMap::new();
        for booking in bookings {
            if booking.scheduled_at < start || booking.scheduled_at >= end {
                continue;
            }
            by_slot
                .entry(window.slot_start(booking.scheduled_at))
                .or_default()
                .push(booking);
        }
        Ok(by_slot)
    }

    /// Franjas de una hora de la ventana operativa para `date`
    pub async fn get_available_slots(
        &self,
        date: NaiveDate,
        vehicle_type: Option<&str>,
        service_area: Option<&str>,
    ) -> AppResult<AvailabilityResponse> {
        let window = self.config.resolve(service_area);
        let by_slot = self.bookings_by_slot(&window, date).await?;

        let mut slots = Vec::with_capacity(window.hours().count());
        for hour in window.hours() {
            let time = window.slot_instant(date, hour);
            let at_hour = by_slot.get(&time).map(Vec::as_slice).unwrap_or(&[]);

            let occupied = match vehicle_type {
                Some(vt) => at_hour.iter().any(|b| b.vehicle_type_id == vt),
                None => !at_hour.is_empty(),
            };
            let held = match vehicle_type {
                Some(vt) => self.holds.current(vt, time).await?.is_some(),
                None => false,
            };

            let demand_level = DemandLevel::from_count(
                at_hour.len(),
                self.config.medium_threshold,
                self.config.high_threshold,
            );

            slots.push(TimeSlot {
                time,
                hour,
                available: !occupied && !held,
                demand_level,
                surge_multiplier: demand_level.surge_multiplier(),
                booking_count: at_hour.len(),
            });
        }

        debug!(
            "📅 {} franjas para {} (tier: {:?}, zona: {:?})",
            slots.len(),
            date,
            vehicle_type,
            service_area
        );

        Ok(AvailabilityResponse {
            date,
            slots,
            timezone: window.timezone,
            service_area: service_area.map(str::to_string),
        })
    }

    /// Horas con demanda media o alta, en orden ascendente
    pub async fn get_busy_times(&self, date: NaiveDate, service_area: Option<&str>) -> AppResult<BusyTimesResponse> {
        let window = self.config.resolve(service_area);
        let by_slot = self.bookings_by_slot(&window, date).await?;

        let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
        for (slot_start, bookings) in &by_slot {
            *counts.entry(window.local_hour(*slot_start)).or_default() += bookings.len();
        }

        let busy_hours = counts
            .into_iter()
            .filter(|(_, count)| *count >= self.config.medium_threshold)
            .map(|(hour, booking_count)| BusyHour {
                hour,
                booking_count,
                surge_active: booking_count >= self.config.high_threshold,
            })
            .collect();

        Ok(BusyTimesResponse {
            date,
            busy_hours,
            timezone: window.timezone,
        })
    }

    /// Libre si no hay reserva activa del tier en la franja (ignorando
    /// `exclude_booking`) ni un hold vigente de otra cotización
    pub async fn is_slot_available(
        &self,
        scheduled_at: DateTime<Utc>,
        vehicle_type: &str,
        exclude_booking: Option<Uuid>,
        hold_owner: Option<Uuid>,
    ) -> AppResult<bool> {
        let slot_start = self.slot_start_for(scheduled_at);

        if self
            .bookings
            .find_active_in_slot(vehicle_type, slot_start, exclude_booking)
            .await?
            .is_some()
        {
            return Ok(false);
        }

        let held_by_other = self
            .holds
            .current(vehicle_type, slot_start)
            .await?
            .map_or(false, |h| Some(h.estimate_id) != hold_owner);

        Ok(!held_by_other)
    }

    /// Hold temporal de la franja para una cotización mientras termina el checkout
    pub async fn reserve_slot(
        &self,
        scheduled_at: DateTime<Utc>,
        vehicle_type: &str,
        estimate_id: Uuid,
    ) -> AppResult<SlotHold> {
        self.ensure_within_window(scheduled_at)?;
        let slot_start = self.slot_start_for(scheduled_at);

        if self
            .bookings
            .find_active_in_slot(vehicle_type, slot_start, None)
            .await?
            .is_some()
        {
            return Err(slot_conflict_error(vehicle_type, slot_start));
        }

        let ttl = self.config.hold_ttl;
        let hold = SlotHold {
            reservation_id: Uuid::new_v4(),
            vehicle_type_id: vehicle_type.to_string(),
            slot_start,
            estimate_id,
            expires_at: Utc::now() + Duration::seconds(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)),
        };

        let hold = self.holds.acquire(hold, ttl).await?;
        info!(
            "⏳ Franja {} ({}) retenida para estimate {} hasta {}",
            slot_start, vehicle_type, estimate_id, hold.expires_at
        );
        Ok(hold)
    }

    /// Liberar un hold explícitamente; solo el dueño puede hacerlo
    pub async fn release_hold(
        &self,
        scheduled_at: DateTime<Utc>,
        vehicle_type: &str,
        estimate_id: Uuid,
    ) -> AppResult<bool> {
        let slot_start = self.slot_start_for(scheduled_at);
        let released = self.holds.release(vehicle_type, slot_start, estimate_id).await?;
        if released {
            info!("🔓 Hold liberado: {} ({})", slot_start, vehicle_type);
        }
        Ok(released)
    }

    /// La reserva ya ocupa la franja: consumir el hold de su cotización
    pub async fn book_slot(&self, booking: &Booking) -> AppResult<()> {
        if self
            .holds
            .release(&booking.vehicle_type_id, booking.slot_start, booking.estimate_id)
            .await?
        {
            debug!("🎟️ Hold consumido por reserva {}", booking.id);
        }
        Ok(())
    }

    /// La reserva dejó la franja `slot_start`: soltar cualquier hold residual de su cotización
    pub async fn release_slot(&self, booking: &Booking, slot_start: DateTime<Utc>) -> AppResult<()> {
        if self
            .holds
            .release(&booking.vehicle_type_id, slot_start, booking.estimate_id)
            .await?
        {
            debug!("🔓 Hold residual liberado para reserva {}", booking.id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemorySlotHoldStore;
    use crate::config::ServiceAreaOverride;
    use crate::models::{BookingStatus, NewBooking};
    use crate::repositories::InMemoryBookingStore;
    use chrono::TimeZone;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    /// Hora local de Toronto (UTC-5): la medianoche local son las 05:00 UTC
    fn local(hour: i64, minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 5, 0, 0).unwrap() + Duration::hours(hour) + Duration::minutes(minute)
    }

    fn service() -> (TimeSlotService, Arc<InMemoryBookingStore>) {
        let store = Arc::new(InMemoryBookingStore::new());
        let service = TimeSlotService::new(
            store.clone(),
            Arc::new(InMemorySlotHoldStore::new()),
            SchedulingConfig::default(),
        );
        (service, store)
    }

    async fn book(service: &TimeSlotService, store: &InMemoryBookingStore, vehicle: &str, at: DateTime<Utc>) -> Booking {
        store
            .insert(NewBooking {
                estimate_id: Uuid::new_v4(),
                vehicle_type_id: vehicle.to_string(),
                user_id: None,
                customer_name: "Test".to_string(),
                customer_email: "test@example.com".to_string(),
                customer_phone: "4165550100".to_string(),
                scheduled_at: at,
                slot_start: service.slot_start_for(at),
                items_description: None,
                photo_urls: Vec::new(),
                special_instructions: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_empty_day_has_thirteen_open_slots() {
        let (service, _) = service();
        let response = service.get_available_slots(date(), None, None).await.unwrap();

        assert_eq!(response.slots.len(), 13);
        assert_eq!(response.timezone, "America/Toronto");
        assert_eq!(response.slots[0].hour, 8);
        assert_eq!(response.slots[0].time, local(8, 0));
        assert_eq!(response.slots[12].hour, 20);
        assert!(response
            .slots
            .iter()
            .all(|s| s.available && s.demand_level == DemandLevel::Low && s.surge_multiplier == 1.0));
    }

    #[tokio::test]
    async fn test_tier_filter_and_demand() {
        let (service, store) = service();
        for (vehicle, minute) in [("van", 5), ("xl", 10), ("box", 20), ("pickup", 45)] {
            book(&service, &store, vehicle, local(14, minute)).await;
        }
        book(&service, &store, "van", local(9, 0)).await;

        let vans = service.get_available_slots(date(), Some("van"), None).await.unwrap();
        let at_14 = vans.slots.iter().find(|s| s.hour == 14).unwrap();
        assert!(!at_14.available);
        assert_eq!(at_14.booking_count, 4);
        assert_eq!(at_14.demand_level, DemandLevel::Medium);
        assert_eq!(at_14.surge_multiplier, 1.2);
        assert!(!vans.slots.iter().find(|s| s.hour == 9).unwrap().available);
        assert!(vans.slots.iter().find(|s| s.hour == 10).unwrap().available);

        // Sin filtro cualquier reserva ocupa la hora
        let all = service.get_available_slots(date(), None, None).await.unwrap();
        assert!(!all.slots.iter().find(|s| s.hour == 9).unwrap().available);

        // Otro tier sigue libre a las 9
        let xl = service.get_available_slots(date(), Some("xl"), None).await.unwrap();
        assert!(xl.slots.iter().find(|s| s.hour == 9).unwrap().available);
    }

    #[tokio::test]
    async fn test_busy_times_thresholds() {
        let (service, store) = service();
        for vehicle in ["van", "xl", "box", "pickup", "cargo"] {
            book(&service, &store, vehicle, local(17, 0)).await;
        }
        for vehicle in ["van", "xl", "box"] {
            book(&service, &store, vehicle, local(11, 30)).await;
        }
        book(&service, &store, "van", local(12, 0)).await;

        let busy = service.get_busy_times(date(), None).await.unwrap();
        assert_eq!(busy.busy_hours.len(), 2);
        assert_eq!(busy.busy_hours[0].hour, 11);
        assert_eq!(busy.busy_hours[0].booking_count, 3);
        assert!(!busy.busy_hours[0].surge_active);
        assert_eq!(busy.busy_hours[1].hour, 17);
        assert!(busy.busy_hours[1].surge_active);

        let slots = service.get_available_slots(date(), None, None).await.unwrap();
        let at_17 = slots.slots.iter().find(|s| s.hour == 17).unwrap();
        assert_eq!(at_17.demand_level, DemandLevel::High);
        assert_eq!(at_17.surge_multiplier, 1.5);
    }

    #[tokio::test]
    async fn test_other_days_are_ignored() {
        let (service, store) = service();
        book(&service, &store, "van", local(14, 0) + Duration::days(1)).await;

        let response = service.get_available_slots(date(), Some("van"), None).await.unwrap();
        assert!(response.slots.iter().all(|s| s.available && s.booking_count == 0));
    }

    #[tokio::test]
    async fn test_slot_availability_and_cancellation() {
        let (service, store) = service();
        let mut booking = book(&service, &store, "van", local(14, 10)).await;

        assert!(!service.is_slot_available(local(14, 59), "van", None, None).await.unwrap());
        assert!(service.is_slot_available(local(14, 59), "xl", None, None).await.unwrap());
        assert!(service.is_slot_available(local(15, 0), "van", None, None).await.unwrap());
        assert!(service
            .is_slot_available(local(14, 30), "van", Some(booking.id), None)
            .await
            .unwrap());

        booking.status = BookingStatus::Cancelled;
        store.update(&booking).await.unwrap();
        assert!(service.is_slot_available(local(14, 0), "van", None, None).await.unwrap());
    }

    #[tokio::test]
    async fn test_hold_blocks_other_estimates() {
        let (service, _) = service();
        let owner = Uuid::new_v4();
        let hold = service.reserve_slot(local(10, 15), "van", owner).await.unwrap();
        assert_eq!(hold.slot_start, local(10, 0));

        assert!(service.is_slot_available(local(10, 0), "van", None, Some(owner)).await.unwrap());
        assert!(!service.is_slot_available(local(10, 0), "van", None, None).await.unwrap());
        assert!(service
            .reserve_slot(local(10, 40), "van", Uuid::new_v4())
            .await
            .unwrap_err()
            .is_conflict());

        let slots = service.get_available_slots(date(), Some("van"), None).await.unwrap();
        assert!(!slots.slots.iter().find(|s| s.hour == 10).unwrap().available);

        assert!(service.release_hold(local(10, 0), "van", owner).await.unwrap());
        assert!(service.is_slot_available(local(10, 0), "van", None, None).await.unwrap());
    }

    #[tokio::test]
    async fn test_reserve_outside_window_is_rejected() {
        let (service, _) = service();
        let result = service.reserve_slot(local(22, 0), "van", Uuid::new_v4()).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_service_area_window() {
        let store = Arc::new(InMemoryBookingStore::new());
        let mut config = SchedulingConfig::default();
        config.service_areas.insert(
            "vancouver".to_string(),
            ServiceAreaOverride {
                operating_hours: Some((9, 17)),
                timezone: Some("America/Vancouver".to_string()),
                utc_offset_minutes: Some(-480),
            },
        );
        let service = TimeSlotService::new(store, Arc::new(InMemorySlotHoldStore::new()), config);

        let response = service
            .get_available_slots(date(), None, Some("vancouver"))
            .await
            .unwrap();
        assert_eq!(response.slots.len(), 9);
        assert_eq!(response.timezone, "America/Vancouver");
        assert_eq!(response.slots[0].time, Utc.with_ymd_and_hms(2025, 6, 2, 17, 0, 0).unwrap());
        assert_eq!(response.service_area.as_deref(), Some("vancouver"));
    }
}
