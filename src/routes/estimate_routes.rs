use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::controllers::EstimateController;
use crate::dto::{ApiResponse, CalculateEstimateRequest, EstimateResponse, RouteRequest, RouteSummary};
use crate::models::{Estimate, VehicleTier};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_estimate_router() -> Router<AppState> {
    Router::new()
        .route("/calculate", post(calculate_estimate))
        .route("/vehicles", get(list_vehicles))
        .route("/geocode/route", post(calculate_route))
        .route("/user/:user_id", get(list_user_estimates))
        .route("/:id", get(get_estimate))
        .route("/:id/save", post(save_estimate))
}

fn controller(state: &AppState) -> EstimateController {
    EstimateController::new(state.estimate_service.clone())
}

async fn calculate_estimate(
    State(state): State<AppState>,
    Json(request): Json<CalculateEstimateRequest>,
) -> Result<(StatusCode, Json<ApiResponse<EstimateResponse>>), AppError> {
    let response = controller(&state).calculate(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn list_vehicles(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<VehicleTier>>>, AppError> {
    let response = controller(&state).list_vehicles().await?;
    Ok(Json(response))
}

async fn calculate_route(
    State(state): State<AppState>,
    Json(request): Json<RouteRequest>,
) -> Result<Json<ApiResponse<RouteSummary>>, AppError> {
    let response = controller(&state).calculate_route(request).await?;
    Ok(Json(response))
}

async fn get_estimate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Estimate>>, AppError> {
    let response = controller(&state).get_by_id(id).await?;
    Ok(Json(response))
}

async fn save_estimate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Estimate>>, AppError> {
    let response = controller(&state).save(id).await?;
    Ok(Json(response))
}

async fn list_user_estimates(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Estimate>>>, AppError> {
    let response = controller(&state).list_by_user(user_id).await?;
    Ok(Json(response))
}
