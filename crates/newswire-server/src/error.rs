//! Domain error to HTTP response mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use newswire_types::Error;
use serde_json::json;
use tracing::error;

/// Wrapper giving the domain error an HTTP shape.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::UserNotFound | Error::NewsNotFound(_) => StatusCode::NOT_FOUND,
            Error::DuplicateUsername(_) | Error::AlreadyLiked(_) | Error::NotLiked(_) => {
                StatusCode::CONFLICT
            }
            Error::AuthenticationRejected => StatusCode::UNAUTHORIZED,
            Error::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Store faults are logged server-side and not echoed to clients.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Store failure: {}", self.0);
            "store unavailable".to_string()
        } else {
            self.0.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
