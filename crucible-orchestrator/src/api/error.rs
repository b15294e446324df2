//! API Error Handling
//!
//! Maps engine errors onto HTTP status codes. Ineligibility never reaches
//! this module: it is a 200 with a rejection body, not an error.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crucible_engine::error::EngineError;

/// API error type
#[derive(Debug)]
pub struct ApiError(EngineError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::InvalidDefinition(_) => StatusCode::BAD_REQUEST,
            EngineError::TaskNotFound(_)
            | EngineError::RunNotFound(_)
            | EngineError::TenantNotFound(_) => StatusCode::NOT_FOUND,
            EngineError::RunAlreadyActive { .. } => StatusCode::CONFLICT,
            EngineError::BillingUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::Store(err) => {
                tracing::error!("Database error: {:?}", err);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "error": "internal server error" })),
                )
                    .into_response();
            }
        };

        (
            status,
            Json(serde_json::json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError(err)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
