//! Failure taxonomy for the admission pipeline.

use std::time::Duration;

use thiserror::Error;

/// Every way an upload can fail.
///
/// The client-caused variants map to 4xx responses with fixed messages.
/// `Storage` and `Internal` carry detail for the log only; it never reaches
/// the response body.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The client used up its request quota for the current window.
    #[error("request quota exhausted, window resets in {retry_after:?}")]
    ThrottleExceeded { retry_after: Duration },

    /// The file grew past the configured byte limit while streaming.
    #[error("file exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },

    /// The declared MIME type is not on the allow-list.
    #[error("declared type {declared:?} is not allowed")]
    UnsupportedType { declared: Option<String> },

    /// The body is not a usable multipart form.
    #[error("malformed upload: {0}")]
    Malformed(&'static str),

    /// The client stopped sending before the upload completed.
    #[error("upload stalled waiting for the client")]
    Stalled,

    /// Writing to the upload directory failed.
    #[error("storage failure: {0}")]
    Storage(#[from] std::io::Error),

    /// Anything else that should never happen.
    #[error("internal error: {0}")]
    Internal(String),
}

impl UploadError {
    /// Short stable label, used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ThrottleExceeded { .. } => "throttled",
            Self::TooLarge { .. } => "too_large",
            Self::UnsupportedType { .. } => "unsupported_type",
            Self::Malformed(_) => "malformed",
            Self::Stalled => "stalled",
            Self::Storage(_) => "storage",
            Self::Internal(_) => "internal",
        }
    }

    /// Whether the client caused this failure.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Storage(_) | Self::Internal(_))
    }
}
