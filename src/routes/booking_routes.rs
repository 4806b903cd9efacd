use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::controllers::BookingController;
use crate::dto::{
    ApiResponse, AvailabilityQuery, BusyTimesQuery, CreateBookingRequest, RateBookingRequest,
    ReleaseSlotResponse, ReserveSlotRequest, SlotHoldResponse, UpdateBookingRequest,
};
use crate::models::{AvailabilityResponse, Booking, BusyTimesResponse};
use crate::services::BookingStatusSummary;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_booking_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_booking))
        .route("/availability/slots", get(available_slots))
        .route("/availability/busy-times", get(busy_times))
        .route("/slots/reserve", post(reserve_slot).delete(release_slot))
        .route("/user/:user_id/history", get(booking_history))
        .route("/:id", get(get_booking).put(update_booking).delete(cancel_booking))
        .route("/:id/confirm", post(confirm_booking))
        .route("/:id/start", post(start_booking))
        .route("/:id/complete", post(complete_booking))
        .route("/:id/rating", post(rate_booking))
        .route("/:id/status", get(booking_status))
}

fn controller(state: &AppState) -> BookingController {
    BookingController::new(
        state.booking_service.clone(),
        state.estimate_service.clone(),
        state.time_slot_service.clone(),
    )
}

async fn create_booking(
    State(state): State<AppState>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Booking>>), AppError> {
    let response = controller(&state).create(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Booking>>, AppError> {
    let response = controller(&state).get_by_id(id).await?;
    Ok(Json(response))
}

async fn update_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateBookingRequest>,
) -> Result<Json<ApiResponse<Booking>>, AppError> {
    let response = controller(&state).update(id, request).await?;
    Ok(Json(response))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Booking>>, AppError> {
    let response = controller(&state).cancel(id).await?;
    Ok(Json(response))
}

async fn confirm_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Booking>>, AppError> {
    let response = controller(&state).confirm(id).await?;
    Ok(Json(response))
}

async fn start_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Booking>>, AppError> {
    let response = controller(&state).start(id).await?;
    Ok(Json(response))
}

async fn complete_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Booking>>, AppError> {
    let response = controller(&state).complete(id).await?;
    Ok(Json(response))
}

async fn rate_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RateBookingRequest>,
) -> Result<Json<ApiResponse<Booking>>, AppError> {
    let response = controller(&state).rate(id, request).await?;
    Ok(Json(response))
}

async fn booking_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<BookingStatusSummary>>, AppError> {
    let response = controller(&state).status(id).await?;
    Ok(Json(response))
}

async fn booking_history(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Booking>>>, AppError> {
    let response = controller(&state).history(user_id).await?;
    Ok(Json(response))
}

async fn available_slots(
    State(state): State<AppState>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<ApiResponse<AvailabilityResponse>>, AppError> {
    let response = controller(&state).available_slots(query).await?;
    Ok(Json(response))
}

async fn busy_times(
    State(state): State<AppState>,
    Query(query): Query<BusyTimesQuery>,
) -> Result<Json<ApiResponse<BusyTimesResponse>>, AppError> {
    let response = controller(&state).busy_times(query).await?;
    Ok(Json(response))
}

async fn reserve_slot(
    State(state): State<AppState>,
    Json(request): Json<ReserveSlotRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SlotHoldResponse>>), AppError> {
    let response = controller(&state).reserve_slot(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn release_slot(
    State(state): State<AppState>,
    Json(request): Json<ReserveSlotRequest>,
) -> Result<Json<ApiResponse<ReleaseSlotResponse>>, AppError> {
    let response = controller(&state).release_slot(request).await?;
    Ok(Json(response))
}
