use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::dto::{ApiResponse, CalculateEstimateRequest, EstimateResponse, RouteRequest, RouteSummary};
use crate::models::{Estimate, VehicleTier};
use crate::services::EstimateService;
use crate::utils::errors::AppError;

pub struct EstimateController {
    service: Arc<EstimateService>,
}

impl EstimateController {
    pub fn new(service: Arc<EstimateService>) -> Self {
        Self { service }
    }

    pub async fn calculate(
        &self,
        request: CalculateEstimateRequest,
    ) -> Result<ApiResponse<EstimateResponse>, AppError> {
        request.validate()?;

        let quote = self
            .service
            .calculate_estimate(
                request.pickup,
                request.destination,
                request.vehicle_type.trim(),
                request.estimated_duration,
                request.user_id,
            )
            .await?;

        Ok(ApiResponse::success_with_message(
            EstimateResponse::from(quote),
            "Estimate calculated successfully",
        ))
    }

    pub async fn calculate_route(&self, request: RouteRequest) -> Result<ApiResponse<RouteSummary>, AppError> {
        request.validate()?;
        let route = self
            .service
            .calculate_route(request.origin.trim(), request.destination.trim())
            .await?;
        Ok(ApiResponse::success(RouteSummary::from(&route)))
    }

    pub async fn list_vehicles(&self) -> Result<ApiResponse<Vec<VehicleTier>>, AppError> {
        Ok(ApiResponse::success(self.service.list_vehicles().await?))
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<ApiResponse<Estimate>, AppError> {
        Ok(ApiResponse::success(self.service.get_estimate(id).await?))
    }

    pub async fn list_by_user(&self, user_id: Uuid) -> Result<ApiResponse<Vec<Estimate>>, AppError> {
        Ok(ApiResponse::success(self.service.find_by_user(user_id).await?))
    }

    pub async fn save(&self, id: Uuid) -> Result<ApiResponse<Estimate>, AppError> {
        let estimate = self.service.save_estimate(id).await?;
        Ok(ApiResponse::success_with_message(estimate, "Estimate saved"))
    }
}
