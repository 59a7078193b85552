// API error rendering

use app_core::{CoreError, ErrorCode};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{error, warn};

/// Wrapper giving every handler a uniform error body:
/// `{"error": {"code": "...", "message": "..."}}` with a stable machine
/// readable code.
pub struct ApiError(pub CoreError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<CoreError> for ApiError {
    fn from(value: CoreError) -> Self {
        ApiError(value)
    }
}

impl From<app_core::DbError> for ApiError {
    fn from(value: app_core::DbError) -> Self {
        ApiError(CoreError::Db(value))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.code();
        let status = match code {
            ErrorCode::Validation => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict | ErrorCode::Stale => StatusCode::CONFLICT,
            ErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorCode::Upstream => StatusCode::BAD_GATEWAY,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        match code {
            ErrorCode::Internal => error!(error = %self.0, "request_failed"),
            _ => warn!(error = %self.0, code = code.as_str(), "request_rejected"),
        }
        let body = json!({
            "error": {
                "code": code.as_str(),
                "message": self.0.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}
