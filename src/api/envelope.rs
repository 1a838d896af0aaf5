//! Error envelope and request extractors shared by all endpoints.
//!
//! Successful responses keep the plain JSON shapes the field nodes and the
//! dashboard already consume. Every failure is rendered as
//! `{ "status": "error", "code": "...", "message": "..." }`.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::risk::RiskError;

/// Error body: `{ "status": "error", "code": "...", "message": "..." }`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub code: &'static str,
    pub message: String,
}

/// Every way a request can fail.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed parameters (unparsable timestamp, bad query string)
    #[error("{0}")]
    BadRequest(String),

    /// Body or query rejected by the extractor; keeps the extractor's status
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    /// Thresholds would be degenerate; nothing was applied
    #[error("invalid risk configuration: {}", .0.join("; "))]
    InvalidConfiguration(Vec<String>),

    /// A reading with a non-finite field; nothing was stored
    #[error("invalid reading: {field} is not a finite number (got {value})")]
    InvalidReading { field: &'static str, value: f64 },

    #[error("unknown threshold '{name}'{}", did_you_mean(.suggestion))]
    UnknownThreshold {
        name: String,
        suggestion: Option<String>,
    },

    #[error("{0}")]
    NotFound(String),

    /// Server-side failure while building the response
    #[error("{0}")]
    Internal(String),
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map(|s| format!(", did you mean '{s}'?"))
        .unwrap_or_default()
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::InvalidConfiguration(_) => StatusCode::BAD_REQUEST,
            Self::Rejected { status, .. } => *status,
            Self::InvalidReading { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::UnknownThreshold { .. } | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Rejected { .. } => "INVALID_REQUEST",
            Self::InvalidConfiguration(_) => "INVALID_CONFIGURATION",
            Self::InvalidReading { .. } => "INVALID_READING",
            Self::UnknownThreshold { .. } => "UNKNOWN_THRESHOLD",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            status: "error",
            code: self.code(),
            message: self.to_string(),
        };
        (self.status(), axum::Json(body)).into_response()
    }
}

impl From<RiskError> for ApiError {
    fn from(err: RiskError) -> Self {
        match err {
            RiskError::InvalidReading { field, value } => Self::InvalidReading { field, value },
            RiskError::InvalidConfiguration(problems) => Self::InvalidConfiguration(problems),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

/// `axum::Json` whose rejections render as [`ErrorBody`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Query` whose rejections render as [`ErrorBody`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_error_response_shape() {
        let resp = ApiError::NotFound("gone".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let v = body_json(resp).await;
        assert_eq!(v["status"], "error");
        assert_eq!(v["code"], "NOT_FOUND");
        assert_eq!(v["message"], "gone");
    }

    #[tokio::test]
    async fn test_invalid_reading_is_422() {
        let err: ApiError = RiskError::InvalidReading {
            field: "moisture",
            value: f64::NAN,
        }
        .into();
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(resp).await["code"], "INVALID_READING");
    }

    #[tokio::test]
    async fn test_internal_error_is_500() {
        let resp = ApiError::Internal("CSV export failed".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let v = body_json(resp).await;
        assert_eq!(v["code"], "INTERNAL_ERROR");
        assert_eq!(v["message"], "CSV export failed");
    }

    #[test]
    fn test_unknown_threshold_message_includes_suggestion() {
        let err = ApiError::UnknownThreshold {
            name: "tilt_dangr".to_string(),
            suggestion: Some("tilt_danger".to_string()),
        };
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            err.to_string(),
            "unknown threshold 'tilt_dangr', did you mean 'tilt_danger'?"
        );
    }
}
