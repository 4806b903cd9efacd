//! Ciclo de vida de reservas
//!
//! PENDING → CONFIRMED → IN_PROGRESS → COMPLETED, con CANCELLED desde
//! PENDING o CONFIRMED. Toda escritura sobre una reserva se hace bajo el lock
//! de su franja; el store rechaza dobles ocupaciones y copias desactualizadas.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::estimate_service::EstimateService;
use super::notification_service::{BookingNotification, NotificationDispatcher};
use super::slot_lock::{SlotLockGuard, SlotLocks};
use super::time_slot_service::TimeSlotService;
use crate::config::BookingPolicy;
use crate::models::{Booking, BookingStatus, NewBooking};
use crate::repositories::BookingStore;
use crate::utils::errors::{not_found_error, slot_conflict_error, stale_booking_error, AppError, AppResult};

/// Datos de creación de una reserva
#[derive(Debug, Clone)]
pub struct CreateBooking {
    pub estimate_id: Uuid,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub scheduled_at: DateTime<Utc>,
    pub items_description: Option<String>,
    pub photo_urls: Vec<String>,
    pub special_instructions: Option<String>,
    pub user_id: Option<Uuid>,
}

/// Cambios parciales; `None` deja el campo como está
#[derive(Debug, Clone, Default)]
pub struct BookingChanges {
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub items_description: Option<String>,
    pub photo_urls: Option<Vec<String>>,
    pub special_instructions: Option<String>,
}

/// Proyección de estado; la ETA es hoy la hora programada
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingStatusSummary {
    pub id: Uuid,
    pub status: BookingStatus,
    pub scheduled_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub estimated_arrival: DateTime<Utc>,
}

/// Reintentos de `lock_booking` si la reserva cambia de franja en medio
const MAX_LOCK_ATTEMPTS: usize = 3;

pub struct BookingService {
    bookings: Arc<dyn BookingStore>,
    estimates: Arc<EstimateService>,
    slots: Arc<TimeSlotService>,
    notifier: Arc<dyn NotificationDispatcher>,
    locks: SlotLocks,
    policy: BookingPolicy,
}

impl BookingService {
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        estimates: Arc<EstimateService>,
        slots: Arc<TimeSlotService>,
        notifier: Arc<dyn NotificationDispatcher>,
        policy: BookingPolicy,
    ) -> Self {
        Self {
            bookings,
            estimates,
            slots,
            notifier,
            locks: SlotLocks::new(),
            policy,
        }
    }

    pub async fn create(&self, request: CreateBooking) -> AppResult<Booking> {
        let estimate = self.estimates.get_estimate(request.estimate_id).await?;
        self.slots.ensure_within_window(request.scheduled_at)?;

        let vehicle_type = estimate.vehicle_type_id.clone();
        let slot_start = self.slots.slot_start_for(request.scheduled_at);

        let booking = {
            let _guard = self.locks.lock(&vehicle_type, slot_start).await;

            if !self
                .slots
                .is_slot_available(request.scheduled_at, &vehicle_type, None, Some(estimate.id))
                .await?
            {
                return Err(slot_conflict_error(&vehicle_type, slot_start));
            }

            self.bookings
                .insert(NewBooking {
                    estimate_id: estimate.id,
                    vehicle_type_id: vehicle_type.clone(),
                    user_id: request.user_id,
                    customer_name: request.customer_name,
                    customer_email: request.customer_email,
                    customer_phone: request.customer_phone,
                    scheduled_at: request.scheduled_at,
                    slot_start,
                    items_description: request.items_description,
                    photo_urls: request.photo_urls,
                    special_instructions: request.special_instructions,
                })
                .await?
        };

        info!(
            "📦 Reserva {} creada: {} a las {} (estimate {})",
            booking.id, vehicle_type, booking.scheduled_at, estimate.id
        );

        // La reserva ya es firme: los pasos siguientes no la deshacen
        if let Err(e) = self.slots.book_slot(&booking).await {
            warn!("⚠️ No se pudo consumir el hold de la reserva {}: {}", booking.id, e);
        }
        if let Err(e) = self.estimates.mark_booked(&estimate).await {
            warn!("⚠️ No se pudo marcar el estimate {} como BOOKED: {}", estimate.id, e);
        }

        self.notifier.booking_created(&BookingNotification::from(&booking));
        Ok(booking)
    }

    pub async fn find_one(&self, id: Uuid) -> AppResult<Booking> {
        self.bookings
            .find_by_id(id)
            .await?
            .ok_or_else(|| not_found_error("Booking", &id.to_string()))
    }

    pub async fn find_by_user(&self, user_id: Uuid) -> AppResult<Vec<Booking>> {
        self.bookings.find_by_user(user_id).await
    }

    pub async fn update(&self, id: Uuid, changes: BookingChanges) -> AppResult<Booking> {
        let target_slot = match changes.scheduled_at {
            Some(at) => {
                self.slots.ensure_within_window(at)?;
                Some(self.slots.slot_start_for(at))
            }
            None => None,
        };

        let (_guard, mut booking) = self.lock_booking(id, target_slot).await?;
        ensure_mutable(&booking)?;
        let previous_slot = booking.slot_start;

        if let (Some(at), Some(target_slot)) = (changes.scheduled_at, target_slot) {
            if target_slot != previous_slot
                && booking.status.is_active()
                && !self
                    .slots
                    .is_slot_available(at, &booking.vehicle_type_id, Some(booking.id), Some(booking.estimate_id))
                    .await?
            {
                return Err(slot_conflict_error(&booking.vehicle_type_id, target_slot));
            }
            booking.scheduled_at = at;
            booking.slot_start = target_slot;
        }
        apply_changes(&mut booking, changes);

        // Una sola escritura de fila: la ocupación se mueve de forma atómica
        let updated = self.bookings.update(&booking).await?;

        if updated.slot_start != previous_slot {
            info!("🔁 Reserva {} reprogramada: {} → {}", id, previous_slot, updated.slot_start);
            if let Err(e) = self.slots.release_slot(&updated, previous_slot).await {
                warn!("⚠️ No se pudo liberar el hold anterior de la reserva {}: {}", id, e);
            }
        }

        self.notifier.booking_updated(&BookingNotification::from(&updated));
        Ok(updated)
    }

    pub async fn cancel(&self, id: Uuid) -> AppResult<Booking> {
        let (_guard, mut booking) = self.lock_booking(id, None).await?;
        match booking.status {
            BookingStatus::Cancelled if self.policy.allow_recancel => {
                info!("ℹ️ Reserva {} ya estaba cancelada", id);
                return Ok(booking);
            }
            BookingStatus::Cancelled => {
                return Err(AppError::BadRequest(format!("Booking {} is already cancelled", id)));
            }
            BookingStatus::Completed => {
                return Err(AppError::BadRequest("Cannot cancel a completed booking".to_string()));
            }
            BookingStatus::InProgress => {
                return Err(AppError::BadRequest("Cannot cancel a booking in progress".to_string()));
            }
            BookingStatus::Pending | BookingStatus::Confirmed => {}
        }

        booking.status = BookingStatus::Cancelled;
        let cancelled = self.bookings.update(&booking).await?;

        if let Err(e) = self.slots.release_slot(&cancelled, cancelled.slot_start).await {
            warn!("⚠️ No se pudo liberar el hold de la reserva {}: {}", id, e);
        }

        info!("❌ Reserva {} cancelada", id);
        self.notifier.booking_cancelled(&BookingNotification::from(&cancelled));
        Ok(cancelled)
    }

    pub async fn confirm(&self, id: Uuid) -> AppResult<Booking> {
        // Confirmar puede reactivar la franja: mismo lock que create
        let (_guard, mut booking) = self.lock_booking(id, None).await?;

        if self.policy.confirm_requires_pending && booking.status != BookingStatus::Pending {
            return Err(AppError::BadRequest(format!(
                "Only PENDING bookings can be confirmed (current: {})",
                booking.status
            )));
        }

        booking.status = BookingStatus::Confirmed;
        let confirmed = self.bookings.update(&booking).await?;

        info!("✅ Reserva {} confirmada", id);
        self.notifier.booking_confirmed(&BookingNotification::from(&confirmed));
        Ok(confirmed)
    }

    /// CONFIRMED → IN_PROGRESS
    pub async fn start(&self, id: Uuid) -> AppResult<Booking> {
        let booking = self.transition(id, BookingStatus::InProgress).await?;
        info!("🚚 Reserva {} en curso", id);
        Ok(booking)
    }

    /// IN_PROGRESS → COMPLETED
    pub async fn complete(&self, id: Uuid) -> AppResult<Booking> {
        let booking = self.transition(id, BookingStatus::Completed).await?;
        info!("🏁 Reserva {} completada", id);
        Ok(booking)
    }

    /// Valoración 1..=5, solo para reservas completadas
    pub async fn rate(&self, id: Uuid, rating: i16, review: Option<String>) -> AppResult<Booking> {
        if !(1..=5).contains(&rating) {
            return Err(AppError::BadRequest("Rating must be between 1 and 5".to_string()));
        }

        let (_guard, mut booking) = self.lock_booking(id, None).await?;
        if booking.status != BookingStatus::Completed {
            return Err(AppError::BadRequest("Only completed bookings can be rated".to_string()));
        }

        booking.rating = Some(rating);
        booking.review = review;
        let rated = self.bookings.update(&booking).await?;
        info!("⭐ Reserva {} valorada con {}", id, rating);
        Ok(rated)
    }

    pub async fn get_status(&self, id: Uuid) -> AppResult<BookingStatusSummary> {
        let booking = self.find_one(id).await?;
        Ok(BookingStatusSummary {
            id: booking.id,
            status: booking.status,
            scheduled_at: booking.scheduled_at,
            updated_at: booking.updated_at,
            estimated_arrival: booking.scheduled_at,
        })
    }

    async fn transition(&self, id: Uuid, next: BookingStatus) -> AppResult<Booking> {
        let (_guard, mut booking) = self.lock_booking(id, None).await?;
        if !booking.status.can_transition_to(next) {
            return Err(AppError::BadRequest(format!(
                "Invalid status transition {} → {}",
                booking.status, next
            )));
        }
        booking.status = next;
        self.bookings.update(&booking).await
    }

    /// Tomar el lock de la franja actual de la reserva (más `target` si se
    /// mueve) y devolver la fila releída bajo ese lock. Si otra escritura la
    /// reprogramó mientras esperábamos, se suelta y se reintenta con la nueva franja.
    async fn lock_booking(&self, id: Uuid, target: Option<DateTime<Utc>>) -> AppResult<(SlotLockGuard, Booking)> {
        for _ in 0..MAX_LOCK_ATTEMPTS {
            let snapshot = self.find_one(id).await?;
            let mut keys = vec![(snapshot.vehicle_type_id.clone(), snapshot.slot_start)];
            if let Some(slot) = target {
                keys.push((snapshot.vehicle_type_id.clone(), slot));
            }
            let guard = self.locks.lock_many(keys).await;

            let booking = self.find_one(id).await?;
            if booking.slot_start == snapshot.slot_start {
                return Ok((guard, booking));
            }
            debug!(
                "🔁 Reserva {} movida de {} a {} mientras se esperaba el lock",
                id, snapshot.slot_start, booking.slot_start
            );
        }
        Err(stale_booking_error(id))
    }
}

fn ensure_mutable(booking: &Booking) -> AppResult<()> {
    if booking.status.is_locked() {
        return Err(AppError::BadRequest(format!(
            "Booking {} cannot be modified in status {}",
            booking.id, booking.status
        )));
    }
    Ok(())
}

fn apply_changes(booking: &mut Booking, changes: BookingChanges) {
    if let Some(name) = changes.customer_name {
        booking.customer_name = name;
    }
    if let Some(email) = changes.customer_email {
        booking.customer_email = email;
    }
    if let Some(phone) = changes.customer_phone {
        booking.customer_phone = phone;
    }
    if let Some(items) = changes.items_description {
        booking.items_description = Some(items);
    }
    if let Some(photos) = changes.photo_urls {
        booking.photo_urls = photos;
    }
    if let Some(instructions) = changes.special_instructions {
        booking.special_instructions = Some(instructions);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemorySlotHoldStore;
    use crate::config::SchedulingConfig;
    use crate::models::{Coordinates, DemandLevel, EstimateStatus, Location, RouteResult, VehicleTier};
    use crate::repositories::{InMemoryBookingStore, InMemoryEstimateStore, InMemoryVehicleCatalog};
    use crate::services::pricing_service::{PricingEngine, PricingStrategy};
    use crate::services::route_oracle::RouteOracle;
    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate, TimeZone};
    use std::sync::Mutex;

    struct FixedOracle;

    #[async_trait]
    impl RouteOracle for FixedOracle {
        async fn calculate_route(&self, _origin: &str, _destination: &str) -> AppResult<Option<RouteResult>> {
            Ok(Some(RouteResult {
                distance_meters: 8500,
                duration_seconds: 1260,
                polyline: String::new(),
            }))
        }
    }

    #[derive(Default)]
    struct RecordingDispatcher {
        events: Mutex<Vec<(&'static str, Uuid)>>,
    }

    impl RecordingDispatcher {
        fn record(&self, kind: &'static str, n: &BookingNotification) {
            self.events.lock().unwrap().push((kind, n.booking_id));
        }

        fn kinds(&self) -> Vec<&'static str> {
            self.events.lock().unwrap().iter().map(|(k, _)| *k).collect()
        }
    }

    impl NotificationDispatcher for RecordingDispatcher {
        fn booking_created(&self, n: &BookingNotification) {
            self.record("created", n)
        }
        fn booking_updated(&self, n: &BookingNotification) {
            self.record("updated", n)
        }
        fn booking_cancelled(&self, n: &BookingNotification) {
            self.record("cancelled", n)
        }
        fn booking_confirmed(&self, n: &BookingNotification) {
            self.record("confirmed", n)
        }
    }

    struct Fixture {
        bookings: BookingService,
        estimates: Arc<EstimateService>,
        slots: Arc<TimeSlotService>,
        notifier: Arc<RecordingDispatcher>,
    }

    /// Store en memoria que retrasa las escrituras de un cliente concreto
    struct SlowWriteStore {
        inner: InMemoryBookingStore,
        slow_name: &'static str,
    }

    #[async_trait]
    impl BookingStore for SlowWriteStore {
        async fn insert(&self, booking: NewBooking) -> AppResult<Booking> {
            self.inner.insert(booking).await
        }

        async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Booking>> {
            self.inner.find_by_id(id).await
        }

        async fn update(&self, booking: &Booking) -> AppResult<Booking> {
            if booking.customer_name == self.slow_name {
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
            self.inner.update(booking).await
        }

        async fn find_active_between(
            &self,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
            vehicle_type_id: Option<&str>,
        ) -> AppResult<Vec<Booking>> {
            self.inner.find_active_between(start, end, vehicle_type_id).await
        }

        async fn find_active_in_slot(
            &self,
            vehicle_type_id: &str,
            slot_start: DateTime<Utc>,
            exclude: Option<Uuid>,
        ) -> AppResult<Option<Booking>> {
            self.inner.find_active_in_slot(vehicle_type_id, slot_start, exclude).await
        }

        async fn find_by_user(&self, user_id: Uuid) -> AppResult<Vec<Booking>> {
            self.inner.find_by_user(user_id).await
        }
    }

    fn build(policy: BookingPolicy, booking_store: Arc<dyn BookingStore>, catalog: InMemoryVehicleCatalog) -> Fixture {
        let estimates = Arc::new(EstimateService::new(
            Arc::new(catalog),
            Arc::new(InMemoryEstimateStore::new()),
            Arc::new(FixedOracle),
            PricingEngine::new(PricingStrategy::Standard),
        ));
        let slots = Arc::new(TimeSlotService::new(
            booking_store.clone(),
            Arc::new(InMemorySlotHoldStore::new()),
            SchedulingConfig::default(),
        ));
        let notifier = Arc::new(RecordingDispatcher::default());
        let bookings = BookingService::new(
            booking_store,
            estimates.clone(),
            slots.clone(),
            notifier.clone(),
            policy,
        );
        Fixture {
            bookings,
            estimates,
            slots,
            notifier,
        }
    }

    fn fixture(policy: BookingPolicy) -> Fixture {
        build(
            policy,
            Arc::new(InMemoryBookingStore::new()),
            InMemoryVehicleCatalog::with_default_fleet(),
        )
    }

    fn slow_fixture(slow_name: &'static str) -> Fixture {
        let store = SlowWriteStore {
            inner: InMemoryBookingStore::new(),
            slow_name,
        };
        build(
            BookingPolicy::default(),
            Arc::new(store),
            InMemoryVehicleCatalog::with_default_fleet(),
        )
    }

    /// Hora local de Toronto (UTC-5)
    fn local(hour: i64, minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 5, 0, 0).unwrap() + Duration::hours(hour) + Duration::minutes(minute)
    }

    async fn estimate(estimates: &EstimateService, vehicle: &str) -> Uuid {
        let location = |address: &str| Location {
            address: address.to_string(),
            coordinates: Coordinates { lat: 43.65, lng: -79.38 },
        };
        estimates
            .calculate_estimate(location("A"), location("B"), vehicle, Some(45), None)
            .await
            .unwrap()
            .estimate
            .id
    }

    fn request(estimate_id: Uuid, scheduled_at: DateTime<Utc>) -> CreateBooking {
        CreateBooking {
            estimate_id,
            customer_name: "Ada Lovelace".to_string(),
            customer_email: "ada@example.com".to_string(),
            customer_phone: "4165550100".to_string(),
            scheduled_at,
            items_description: Some("Sofa".to_string()),
            photo_urls: Vec::new(),
            special_instructions: None,
            user_id: None,
        }
    }

    #[tokio::test]
    async fn test_create_books_slot_and_marks_estimate() {
        let f = fixture(BookingPolicy::default());
        let estimate_id = estimate(&f.estimates, "van").await;

        let booking = f.bookings.create(request(estimate_id, local(14, 20))).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.vehicle_type_id, "van");
        assert_eq!(booking.slot_start, local(14, 0));

        let estimate = f.estimates.get_estimate(estimate_id).await.unwrap();
        assert_eq!(estimate.status, EstimateStatus::Booked);
        assert!(!f.slots.is_slot_available(local(14, 0), "van", None, None).await.unwrap());
        assert_eq!(f.notifier.kinds(), vec!["created"]);
    }

    #[tokio::test]
    async fn test_create_validates_estimate_and_window() {
        let f = fixture(BookingPolicy::default());
        let missing = f.bookings.create(request(Uuid::new_v4(), local(14, 0))).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));

        let estimate_id = estimate(&f.estimates, "van").await;
        let too_late = f.bookings.create(request(estimate_id, local(21, 0))).await;
        assert!(matches!(too_late, Err(AppError::BadRequest(_))));
        assert!(f.notifier.kinds().is_empty());
    }

    #[tokio::test]
    async fn test_same_tier_same_hour_conflicts() {
        let f = fixture(BookingPolicy::default());
        let first = estimate(&f.estimates, "van").await;
        let second = estimate(&f.estimates, "van").await;
        let other_tier = estimate(&f.estimates, "xl").await;

        f.bookings.create(request(first, local(14, 0))).await.unwrap();
        let err = f.bookings.create(request(second, local(14, 45))).await.unwrap_err();
        assert!(err.is_conflict());

        f.bookings.create(request(other_tier, local(14, 30))).await.unwrap();
        f.bookings.create(request(second, local(15, 0))).await.unwrap();
    }

    #[tokio::test]
    async fn test_hold_reserves_slot_for_its_estimate() {
        let f = fixture(BookingPolicy::default());
        let owner = estimate(&f.estimates, "van").await;
        let other = estimate(&f.estimates, "van").await;

        f.slots.reserve_slot(local(10, 0), "van", owner).await.unwrap();
        assert!(f.bookings.create(request(other, local(10, 5))).await.unwrap_err().is_conflict());

        f.bookings.create(request(owner, local(10, 5))).await.unwrap();
        // El hold se consumió; la franja queda ocupada por la reserva
        assert!(f.slots.reserve_slot(local(10, 0), "van", other).await.unwrap_err().is_conflict());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_never_double_book() {
        let f = Arc::new(fixture(BookingPolicy::default()));
        let mut estimate_ids = Vec::new();
        for _ in 0..16 {
            estimate_ids.push(estimate(&f.estimates, "van").await);
        }

        let attempts = estimate_ids.into_iter().map(|estimate_id| {
            let f = f.clone();
            tokio::spawn(async move { f.bookings.create(request(estimate_id, local(16, 0))).await })
        });
        let results = futures::future::join_all(attempts).await;

        let mut created = 0;
        for result in results {
            match result.unwrap() {
                Ok(_) => created += 1,
                Err(e) => assert!(e.is_conflict(), "unexpected error: {:?}", e),
            }
        }
        assert_eq!(created, 1);

        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let slots = f.slots.get_available_slots(date, Some("van"), None).await.unwrap();
        let at_16 = slots.slots.iter().find(|s| s.hour == 16).unwrap();
        assert_eq!(at_16.booking_count, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reschedules_never_double_book() {
        let f = Arc::new(fixture(BookingPolicy::default()));
        let mut ids = Vec::new();
        for hour in [9, 10, 11, 12] {
            let estimate_id = estimate(&f.estimates, "van").await;
            ids.push(f.bookings.create(request(estimate_id, local(hour, 0))).await.unwrap().id);
        }

        let attempts = ids.into_iter().map(|id| {
            let f = f.clone();
            tokio::spawn(async move {
                let changes = BookingChanges {
                    scheduled_at: Some(local(18, 0)),
                    ..BookingChanges::default()
                };
                f.bookings.update(id, changes).await
            })
        });
        let results = futures::future::join_all(attempts).await;
        let moved = results.into_iter().filter(|r| matches!(r, Ok(Ok(_)))).count();
        assert_eq!(moved, 1);
    }

    #[tokio::test]
    async fn test_reschedule_moves_occupancy() {
        let f = fixture(BookingPolicy::default());
        let estimate_id = estimate(&f.estimates, "van").await;
        let booking = f.bookings.create(request(estimate_id, local(9, 0))).await.unwrap();

        let changes = BookingChanges {
            scheduled_at: Some(local(13, 30)),
            customer_name: Some("Grace Hopper".to_string()),
            ..BookingChanges::default()
        };
        let updated = f.bookings.update(booking.id, changes).await.unwrap();
        assert_eq!(updated.slot_start, local(13, 0));
        assert_eq!(updated.customer_name, "Grace Hopper");

        assert!(f.slots.is_slot_available(local(9, 0), "van", None, None).await.unwrap());
        assert!(!f.slots.is_slot_available(local(13, 0), "van", None, None).await.unwrap());

        // Moverse dentro de la misma hora no choca consigo misma
        let same_hour = BookingChanges {
            scheduled_at: Some(local(13, 50)),
            ..BookingChanges::default()
        };
        f.bookings.update(booking.id, same_hour).await.unwrap();
    }

    #[tokio::test]
    async fn test_reschedule_into_occupied_slot_conflicts() {
        let f = fixture(BookingPolicy::default());
        let a = estimate(&f.estimates, "van").await;
        let b = estimate(&f.estimates, "van").await;
        let first = f.bookings.create(request(a, local(9, 0))).await.unwrap();
        f.bookings.create(request(b, local(10, 0))).await.unwrap();

        let changes = BookingChanges {
            scheduled_at: Some(local(10, 15)),
            ..BookingChanges::default()
        };
        assert!(f.bookings.update(first.id, changes).await.unwrap_err().is_conflict());

        // El fallo no libera la franja original
        let unchanged = f.bookings.find_one(first.id).await.unwrap();
        assert_eq!(unchanged.slot_start, local(9, 0));
        assert!(!f.slots.is_slot_available(local(9, 0), "van", None, None).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_rejected_once_started() {
        let f = fixture(BookingPolicy::default());
        let estimate_id = estimate(&f.estimates, "van").await;
        let booking = f.bookings.create(request(estimate_id, local(9, 0))).await.unwrap();
        f.bookings.confirm(booking.id).await.unwrap();
        f.bookings.start(booking.id).await.unwrap();

        let changes = BookingChanges {
            customer_phone: Some("4165550199".to_string()),
            ..BookingChanges::default()
        };
        assert!(matches!(
            f.bookings.update(booking.id, changes.clone()).await,
            Err(AppError::BadRequest(_))
        ));

        f.bookings.complete(booking.id).await.unwrap();
        assert!(matches!(f.bookings.update(booking.id, changes).await, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_cancel_frees_slot_only_for_its_hour() {
        let f = fixture(BookingPolicy::default());
        let a = estimate(&f.estimates, "van").await;
        let b = estimate(&f.estimates, "van").await;
        let booking = f.bookings.create(request(a, local(14, 0))).await.unwrap();
        f.bookings.create(request(b, local(15, 0))).await.unwrap();
        f.bookings.confirm(booking.id).await.unwrap();

        let cancelled = f.bookings.cancel(booking.id).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert!(f.slots.is_slot_available(local(14, 0), "van", None, None).await.unwrap());
        assert!(!f.slots.is_slot_available(local(15, 0), "van", None, None).await.unwrap());
        assert_eq!(f.notifier.kinds(), vec!["created", "created", "confirmed", "cancelled"]);
    }

    #[tokio::test]
    async fn test_cancel_rules() {
        let f = fixture(BookingPolicy::default());
        let estimate_id = estimate(&f.estimates, "van").await;
        let booking = f.bookings.create(request(estimate_id, local(9, 0))).await.unwrap();

        f.bookings.cancel(booking.id).await.unwrap();
        // Re-cancelar es un no-op
        let again = f.bookings.cancel(booking.id).await.unwrap();
        assert_eq!(again.status, BookingStatus::Cancelled);
        assert_eq!(f.notifier.kinds(), vec!["created", "cancelled"]);

        let strict = fixture(BookingPolicy {
            allow_recancel: false,
            ..BookingPolicy::default()
        });
        let estimate_id = estimate(&strict.estimates, "van").await;
        let booking = strict.bookings.create(request(estimate_id, local(9, 0))).await.unwrap();
        strict.bookings.cancel(booking.id).await.unwrap();
        assert!(matches!(strict.bookings.cancel(booking.id).await, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_cannot_cancel_in_progress_or_completed() {
        let f = fixture(BookingPolicy::default());
        let estimate_id = estimate(&f.estimates, "van").await;
        let booking = f.bookings.create(request(estimate_id, local(9, 0))).await.unwrap();
        f.bookings.confirm(booking.id).await.unwrap();
        f.bookings.start(booking.id).await.unwrap();
        assert!(matches!(f.bookings.cancel(booking.id).await, Err(AppError::BadRequest(_))));

        f.bookings.complete(booking.id).await.unwrap();
        assert!(matches!(f.bookings.cancel(booking.id).await, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_confirm_strict_requires_pending() {
        let f = fixture(BookingPolicy::default());
        let estimate_id = estimate(&f.estimates, "van").await;
        let booking = f.bookings.create(request(estimate_id, local(9, 0))).await.unwrap();

        assert_eq!(f.bookings.confirm(booking.id).await.unwrap().status, BookingStatus::Confirmed);
        assert!(matches!(f.bookings.confirm(booking.id).await, Err(AppError::BadRequest(_))));

        f.bookings.cancel(booking.id).await.unwrap();
        assert!(matches!(f.bookings.confirm(booking.id).await, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_confirm_lenient_is_unconditional_but_store_guarded() {
        let f = fixture(BookingPolicy {
            confirm_requires_pending: false,
            ..BookingPolicy::default()
        });
        let a = estimate(&f.estimates, "van").await;
        let b = estimate(&f.estimates, "van").await;
        let booking = f.bookings.create(request(a, local(9, 0))).await.unwrap();

        f.bookings.confirm(booking.id).await.unwrap();
        assert_eq!(f.bookings.confirm(booking.id).await.unwrap().status, BookingStatus::Confirmed);

        // Reactivar una cancelada cuya franja ya tiene otra reserva choca
        f.bookings.cancel(booking.id).await.unwrap();
        f.bookings.create(request(b, local(9, 0))).await.unwrap();
        assert!(f.bookings.confirm(booking.id).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_forward_transitions_and_rating() {
        let f = fixture(BookingPolicy::default());
        let estimate_id = estimate(&f.estimates, "van").await;
        let booking = f.bookings.create(request(estimate_id, local(9, 0))).await.unwrap();

        assert!(matches!(f.bookings.start(booking.id).await, Err(AppError::BadRequest(_))));
        assert!(matches!(f.bookings.rate(booking.id, 5, None).await, Err(AppError::BadRequest(_))));

        f.bookings.confirm(booking.id).await.unwrap();
        f.bookings.start(booking.id).await.unwrap();
        let completed = f.bookings.complete(booking.id).await.unwrap();
        assert_eq!(completed.status, BookingStatus::Completed);

        // Completada ya no ocupa la franja
        assert!(f.slots.is_slot_available(local(9, 0), "van", None, None).await.unwrap());

        assert!(matches!(f.bookings.rate(booking.id, 6, None).await, Err(AppError::BadRequest(_))));
        let rated = f
            .bookings
            .rate(booking.id, 5, Some("Great crew".to_string()))
            .await
            .unwrap();
        assert_eq!(rated.rating, Some(5));
    }

    #[tokio::test]
    async fn test_status_projection_and_history() {
        let f = fixture(BookingPolicy::default());
        let user = Uuid::new_v4();
        let estimate_id = estimate(&f.estimates, "van").await;
        let booking = f
            .bookings
            .create(CreateBooking {
                user_id: Some(user),
                ..request(estimate_id, local(9, 10))
            })
            .await
            .unwrap();

        let status = f.bookings.get_status(booking.id).await.unwrap();
        assert_eq!(status.status, BookingStatus::Pending);
        assert_eq!(status.estimated_arrival, booking.scheduled_at);

        assert_eq!(f.bookings.find_by_user(user).await.unwrap().len(), 1);
        assert!(f.bookings.find_by_user(Uuid::new_v4()).await.unwrap().is_empty());
        assert!(matches!(
            f.bookings.get_status(Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_waits_for_in_flight_update() {
        let f = Arc::new(slow_fixture("Grace"));
        let estimate_id = estimate(&f.estimates, "van").await;
        let booking = f.bookings.create(request(estimate_id, local(9, 0))).await.unwrap();

        let rename = {
            let f = f.clone();
            tokio::spawn(async move {
                let changes = BookingChanges {
                    customer_name: Some("Grace".to_string()),
                    ..BookingChanges::default()
                };
                f.bookings.update(booking.id, changes).await
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;

        let cancelled = f.bookings.cancel(booking.id).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(cancelled.customer_name, "Grace");
        rename.await.unwrap().unwrap();

        let stored = f.bookings.find_one(booking.id).await.unwrap();
        assert_eq!(stored.status, BookingStatus::Cancelled);
        assert_eq!(stored.customer_name, "Grace");
        assert!(f.slots.is_slot_available(local(9, 0), "van", None, None).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_follows_concurrent_reschedule() {
        let f = Arc::new(slow_fixture("Grace"));
        let estimate_id = estimate(&f.estimates, "van").await;
        let booking = f.bookings.create(request(estimate_id, local(9, 0))).await.unwrap();

        let reschedule = {
            let f = f.clone();
            tokio::spawn(async move {
                let changes = BookingChanges {
                    customer_name: Some("Grace".to_string()),
                    scheduled_at: Some(local(13, 0)),
                    ..BookingChanges::default()
                };
                f.bookings.update(booking.id, changes).await
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;

        // El cancel esperaba la franja de las 9 y la reserva ya está a las 13
        let cancelled = f.bookings.cancel(booking.id).await.unwrap();
        assert_eq!(cancelled.slot_start, local(13, 0));
        reschedule.await.unwrap().unwrap();

        let stored = f.bookings.find_one(booking.id).await.unwrap();
        assert_eq!(stored.status, BookingStatus::Cancelled);
        assert_eq!(stored.slot_start, local(13, 0));
        assert!(f.slots.is_slot_available(local(9, 0), "van", None, None).await.unwrap());
        assert!(f.slots.is_slot_available(local(13, 0), "van", None, None).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_transitions_serialize_with_updates() {
        let f = Arc::new(slow_fixture("Grace"));
        let estimate_id = estimate(&f.estimates, "van").await;
        let booking = f.bookings.create(request(estimate_id, local(9, 0))).await.unwrap();
        f.bookings.confirm(booking.id).await.unwrap();

        let rename = {
            let f = f.clone();
            tokio::spawn(async move {
                let changes = BookingChanges {
                    customer_name: Some("Grace".to_string()),
                    ..BookingChanges::default()
                };
                f.bookings.update(booking.id, changes).await
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;

        let started = f.bookings.start(booking.id).await.unwrap();
        assert_eq!(started.status, BookingStatus::InProgress);
        rename.await.unwrap().unwrap();
        assert_eq!(
            f.bookings.find_one(booking.id).await.unwrap().status,
            BookingStatus::InProgress
        );
    }

    #[tokio::test]
    async fn test_full_hour_blocks_tier_and_reports_high_demand() {
        let mut fleet = VehicleTier::default_fleet();
        let mut flatbed = fleet[3].clone();
        flatbed.id = "flatbed".to_string();
        flatbed.name = "flatbed".to_string();
        fleet.push(flatbed);
        let f = build(
            BookingPolicy::default(),
            Arc::new(InMemoryBookingStore::new()),
            InMemoryVehicleCatalog::new(fleet),
        );

        for tier in ["pickup", "van", "xl", "box", "flatbed"] {
            let estimate_id = estimate(&f.estimates, tier).await;
            f.bookings.create(request(estimate_id, local(14, 0))).await.unwrap();
        }

        let another_van = estimate(&f.estimates, "van").await;
        let err = f.bookings.create(request(another_van, local(14, 30))).await.unwrap_err();
        assert!(err.is_conflict());

        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let response = f.slots.get_available_slots(date, Some("van"), None).await.unwrap();
        let at_14 = response.slots.iter().find(|s| s.hour == 14).unwrap();
        assert!(!at_14.available);
        assert_eq!(at_14.booking_count, 5);
        assert_eq!(at_14.demand_level, DemandLevel::High);
        assert_eq!(at_14.surge_multiplier, 1.5);

        let at_15 = response.slots.iter().find(|s| s.hour == 15).unwrap();
        assert!(at_15.available);
        assert_eq!(at_15.demand_level, DemandLevel::Low);
    }
}
