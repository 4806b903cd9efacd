//! DTOs de la API
//!
//! Requests validados con `validator` y responses serializados en camelCase.

pub mod booking_dto;
pub mod estimate_dto;

use serde::Serialize;

pub use booking_dto::*;
pub use estimate_dto::*;

/// Envoltorio común de las respuestas exitosas
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope() {
        let body = serde_json::to_value(ApiResponse::success_with_message(3, "ok")).unwrap();
        assert_eq!(body, serde_json::json!({ "success": true, "message": "ok", "data": 3 }));

        let body = serde_json::to_value(ApiResponse::success("x")).unwrap();
        assert!(body.get("message").is_none());
    }
}
