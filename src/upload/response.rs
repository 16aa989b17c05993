//! Maps pipeline results onto HTTP responses.
//!
//! Bodies are plain text with fixed wording. Server-side failures are logged
//! here with full detail and answered with one opaque message.

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use super::error::UploadError;
use super::pipeline::PipelineRun;
use super::storage::StoredFile;
use crate::security::rate_limit::ThrottleDecision;

pub const SUCCESS_MESSAGE: &str = "File uploaded successfully!";
pub const INVALID_TYPE_MESSAGE: &str = "Invalid file type";
pub const MALFORMED_MESSAGE: &str = "Malformed upload request";
pub const STALLED_MESSAGE: &str = "Upload stalled";
pub const RATE_LIMIT_MESSAGE: &str = "Too many requests, please try again later.";
pub const INTERNAL_ERROR_MESSAGE: &str = "Something went wrong.";

/// Client-caused rejection kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    ThrottleExceeded { retry_after_secs: u64 },
    TooLarge { limit: u64 },
    UnsupportedType,
    Malformed,
    Stalled,
}

/// Terminal state of one pass through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    Success(StoredFile),
    Rejected(Rejection),
    InternalError,
}

impl From<Result<StoredFile, UploadError>> for PipelineOutcome {
    fn from(result: Result<StoredFile, UploadError>) -> Self {
        let error = match result {
            Ok(stored) => return Self::Success(stored),
            Err(error) => error,
        };
        match error {
            UploadError::ThrottleExceeded { retry_after } => Self::Rejected(Rejection::ThrottleExceeded {
                retry_after_secs: retry_after.as_secs_f64().ceil() as u64,
            }),
            UploadError::TooLarge { limit } => Self::Rejected(Rejection::TooLarge { limit }),
            UploadError::UnsupportedType { .. } => Self::Rejected(Rejection::UnsupportedType),
            UploadError::Malformed(_) => Self::Rejected(Rejection::Malformed),
            UploadError::Stalled => Self::Rejected(Rejection::Stalled),
            UploadError::Storage(_) | UploadError::Internal(_) => {
                tracing::error!(error = %error, kind = error.kind(), "Upload failed");
                Self::InternalError
            }
        }
    }
}

impl IntoResponse for PipelineOutcome {
    fn into_response(self) -> Response {
        match self {
            Self::Success(_) => (StatusCode::OK, SUCCESS_MESSAGE).into_response(),
            Self::Rejected(Rejection::UnsupportedType) => {
                (StatusCode::BAD_REQUEST, INVALID_TYPE_MESSAGE).into_response()
            }
            Self::Rejected(Rejection::TooLarge { limit }) => (
                StatusCode::BAD_REQUEST,
                format!("File too large: maximum size is {} bytes", limit),
            )
                .into_response(),
            Self::Rejected(Rejection::Malformed) => {
                (StatusCode::BAD_REQUEST, MALFORMED_MESSAGE).into_response()
            }
            Self::Rejected(Rejection::Stalled) => {
                (StatusCode::REQUEST_TIMEOUT, STALLED_MESSAGE).into_response()
            }
            Self::Rejected(Rejection::ThrottleExceeded { retry_after_secs }) => (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_after_secs.to_string())],
                RATE_LIMIT_MESSAGE,
            )
                .into_response(),
            Self::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE).into_response()
            }
        }
    }
}

/// Response for `POST /upload`: the outcome plus the client's quota state.
#[derive(Debug)]
pub struct UploadResponse {
    pub outcome: PipelineOutcome,
    pub quota: Option<ThrottleDecision>,
}

impl From<PipelineRun> for UploadResponse {
    fn from(run: PipelineRun) -> Self {
        Self {
            outcome: PipelineOutcome::from(run.result),
            quota: run.quota,
        }
    }
}

impl IntoResponse for UploadResponse {
    fn into_response(self) -> Response {
        let mut response = self.outcome.into_response();
        if let Some(quota) = self.quota {
            insert_quota_headers(response.headers_mut(), &quota);
        }
        response
    }
}

fn insert_quota_headers(headers: &mut HeaderMap, quota: &ThrottleDecision) {
    let reset_secs = quota.reset_after.as_secs_f64().ceil() as u64;
    headers.insert("ratelimit-limit", HeaderValue::from(quota.limit));
    headers.insert("ratelimit-remaining", HeaderValue::from(quota.remaining));
    headers.insert("ratelimit-reset", HeaderValue::from(reset_secs));
}
