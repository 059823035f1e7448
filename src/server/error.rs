//! HTTP error mapping
//!
//! Every failure leaves the service as `{"error": message, "status": code}`.

use crate::analysis::AnalysisError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// Malformed query string or body (400)
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Analysis(err) => match err {
                AnalysisError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                AnalysisError::InsufficientData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                AnalysisError::UpstreamFetch(_) => StatusCode::BAD_GATEWAY,
                AnalysisError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        }

        let body = axum::Json(json!({
            "error": self.to_string(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
