use crate::utils::error::TrackerError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// A `TrackerError` surfaced to a dashboard client as a JSON body.
#[derive(Debug)]
pub struct ApiError(pub TrackerError);

impl From<TrackerError> for ApiError {
    fn from(err: TrackerError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            TrackerError::ValidationError { .. }
            | TrackerError::InvalidConfigValueError { .. }
            | TrackerError::MissingConfigError { .. }
            | TrackerError::ConfigError { .. } => StatusCode::BAD_REQUEST,
            TrackerError::NoDataError { .. } => StatusCode::NOT_FOUND,
            TrackerError::HttpError(_)
            | TrackerError::MarketDataError { .. }
            | TrackerError::ParseError { .. }
            | TrackerError::SerializationError(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // internal failures keep their details in the log only
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {}", self.0);
            "Internal server error".to_string()
        } else {
            tracing::warn!("Request rejected ({}): {}", status, self.0);
            self.0.user_friendly_message()
        };

        (
            status,
            Json(json!({"error": message, "status": status.as_u16()})),
        )
            .into_response()
    }
}
