use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::dto::{
    non_blank, parse_query_date, ApiResponse, AvailabilityQuery, BusyTimesQuery, CreateBookingRequest,
    RateBookingRequest, ReleaseSlotResponse, ReserveSlotRequest, SlotHoldResponse, UpdateBookingRequest,
};
use crate::models::{AvailabilityResponse, Booking, BusyTimesResponse};
use crate::services::{BookingService, BookingStatusSummary, EstimateService, TimeSlotService};
use crate::utils::errors::{bad_request_error, AppError};

pub struct BookingController {
    bookings: Arc<BookingService>,
    estimates: Arc<EstimateService>,
    slots: Arc<TimeSlotService>,
}

impl BookingController {
    pub fn new(bookings: Arc<BookingService>, estimates: Arc<EstimateService>, slots: Arc<TimeSlotService>) -> Self {
        Self {
            bookings,
            estimates,
            slots,
        }
    }

    pub async fn create(&self, request: CreateBookingRequest) -> Result<ApiResponse<Booking>, AppError> {
        request.validate()?;
        let booking = self.bookings.create(request.into()).await?;
        Ok(ApiResponse::success_with_message(booking, "Booking created successfully"))
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<ApiResponse<Booking>, AppError> {
        Ok(ApiResponse::success(self.bookings.find_one(id).await?))
    }

    pub async fn update(&self, id: Uuid, request: UpdateBookingRequest) -> Result<ApiResponse<Booking>, AppError> {
        request.validate()?;
        let booking = self.bookings.update(id, request.into()).await?;
        Ok(ApiResponse::success_with_message(booking, "Booking updated successfully"))
    }

    pub async fn cancel(&self, id: Uuid) -> Result<ApiResponse<Booking>, AppError> {
        let booking = self.bookings.cancel(id).await?;
        Ok(ApiResponse::success_with_message(booking, "Booking cancelled successfully"))
    }

    pub async fn confirm(&self, id: Uuid) -> Result<ApiResponse<Booking>, AppError> {
        let booking = self.bookings.confirm(id).await?;
        Ok(ApiResponse::success_with_message(booking, "Booking confirmed successfully"))
    }

    pub async fn start(&self, id: Uuid) -> Result<ApiResponse<Booking>, AppError> {
        Ok(ApiResponse::success(self.bookings.start(id).await?))
    }

    pub async fn complete(&self, id: Uuid) -> Result<ApiResponse<Booking>, AppError> {
        Ok(ApiResponse::success(self.bookings.complete(id).await?))
    }

    pub async fn rate(&self, id: Uuid, request: RateBookingRequest) -> Result<ApiResponse<Booking>, AppError> {
        request.validate()?;
        let booking = self.bookings.rate(id, request.rating, request.review).await?;
        Ok(ApiResponse::success_with_message(booking, "Thank you for your feedback"))
    }

    pub async fn status(&self, id: Uuid) -> Result<ApiResponse<BookingStatusSummary>, AppError> {
        Ok(ApiResponse::success(self.bookings.get_status(id).await?))
    }

    pub async fn history(&self, user_id: Uuid) -> Result<ApiResponse<Vec<Booking>>, AppError> {
        Ok(ApiResponse::success(self.bookings.find_by_user(user_id).await?))
    }

    pub async fn available_slots(&self, query: AvailabilityQuery) -> Result<ApiResponse<AvailabilityResponse>, AppError> {
        query.validate()?;
        let date = parse_query_date(&query.date).ok_or_else(|| bad_request_error("Invalid date"))?;
        let availability = self
            .slots
            .get_available_slots(date, non_blank(&query.vehicle_type), non_blank(&query.service_area))
            .await?;
        Ok(ApiResponse::success(availability))
    }

    pub async fn busy_times(&self, query: BusyTimesQuery) -> Result<ApiResponse<BusyTimesResponse>, AppError> {
        query.validate()?;
        let date = parse_query_date(&query.date).ok_or_else(|| bad_request_error("Invalid date"))?;
        let busy = self.slots.get_busy_times(date, non_blank(&query.service_area)).await?;
        Ok(ApiResponse::success(busy))
    }

    /// El tier de la franja retenida es el de la cotización
    pub async fn reserve_slot(&self, request: ReserveSlotRequest) -> Result<ApiResponse<SlotHoldResponse>, AppError> {
        let estimate = self.estimates.get_estimate(request.estimate_id).await?;
        let hold = self
            .slots
            .reserve_slot(request.scheduled_at, &estimate.vehicle_type_id, estimate.id)
            .await?;
        Ok(ApiResponse::success_with_message(
            SlotHoldResponse::from(hold),
            "Slot reserved",
        ))
    }

    pub async fn release_slot(&self, request: ReserveSlotRequest) -> Result<ApiResponse<ReleaseSlotResponse>, AppError> {
        let estimate = self.estimates.get_estimate(request.estimate_id).await?;
        let released = self
            .slots
            .release_hold(request.scheduled_at, &estimate.vehicle_type_id, estimate.id)
            .await?;
        Ok(ApiResponse::success(ReleaseSlotResponse { released }))
    }
}
