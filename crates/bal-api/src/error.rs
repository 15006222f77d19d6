use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Core(#[from] bal_core::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    fn status(&self) -> StatusCode {
        let Self::Core(error) = self else {
            return StatusCode::BAD_REQUEST;
        };
        match error {
            bal_core::Error::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            error if error.is_not_found() => StatusCode::NOT_FOUND,
            bal_core::Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            bal_core::Error::Api(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        let message = match self {
            Self::Core(bal_core::Error::PreconditionFailed(message)) => message,
            other => other.to_string(),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}
