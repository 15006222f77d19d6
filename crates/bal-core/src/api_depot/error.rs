//! Errors raised by the Api Depot clients.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::util::compact_text;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid Api Depot configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Api Depot HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Api Depot resource not found: {0}")]
    NotFound(String),
    #[error("Api Depot error: {message} ({status})")]
    Service { status: u16, message: String },
    #[error("Invalid Api Depot payload: {0}")]
    InvalidPayload(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(error) => {
                error.is_timeout()
                    || error.is_connect()
                    || error.status().is_some_and(is_transient_status)
            }
            Self::Service { status, .. } => StatusCode::from_u16(*status)
                .is_ok_and(is_transient_status),
            Self::InvalidConfiguration(_) | Self::NotFound(_) | Self::InvalidPayload(_) => false,
        }
    }

    /// Build the error for a non-2xx response
    pub(crate) fn from_response(status: StatusCode, body: &str, resource: &str) -> Self {
        if status == StatusCode::NOT_FOUND {
            return Self::NotFound(resource.to_string());
        }
        Self::Service {
            status: status.as_u16(),
            message: parse_api_error(status, body),
        }
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return compact_text(&message);
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .map_or_else(|| format!("HTTP {}", status.as_u16()), str::to_string)
    } else {
        trimmed
    }
}
