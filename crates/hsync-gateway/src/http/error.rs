use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use hsync_core::SyncError;
use tracing::error;

/// Handler error. Renders as plain text so htmx can show it in place.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub SyncError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            SyncError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            SyncError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            SyncError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.0.code(), error = %self.0, "request failed");
            return (status, "Internal server error").into_response();
        }

        let body = match &self.0 {
            SyncError::InvalidInput(msg) => msg.clone(),
            other => other.to_string(),
        };
        match &self.0 {
            SyncError::RateLimited { retry_after_secs } => (
                status,
                [(header::RETRY_AFTER, retry_after_secs.to_string())],
                body,
            )
                .into_response(),
            _ => (status, body).into_response(),
        }
    }
}
