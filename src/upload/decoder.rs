//! Streaming multipart decoding with a byte ceiling.
//!
//! # Data Flow
//! ```text
//! request body
//!     → axum Multipart (field boundaries, headers)
//!     → classify() picks the upload field, drains text fields
//!     → body() yields the upload field's chunks through bounded()
//!     → storage writer
//! ```
//!
//! Nothing is buffered beyond the chunk in flight. The running total is
//! checked on every chunk and the source is dropped as soon as it passes the
//! limit. Every wait on the client is capped by the idle timeout.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use axum::http::StatusCode;
use futures_util::{stream, Stream, StreamExt, TryStreamExt};

use super::error::UploadError;

/// Client-declared metadata of the upload field. Untrusted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMeta {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

/// What a multipart field is to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRole {
    /// The designated upload field.
    Upload(FileMeta),
    /// A file under any other name.
    UnexpectedFile,
    /// A plain form value, ignored.
    Text,
}

/// Reads the designated field out of a multipart body.
#[derive(Debug, Clone)]
pub struct MultipartDecoder {
    field_name: String,
    max_bytes: u64,
    idle_timeout: Duration,
}

impl MultipartDecoder {
    pub fn new(field_name: impl Into<String>, max_bytes: u64, idle_timeout: Duration) -> Self {
        Self {
            field_name: field_name.into(),
            max_bytes,
            idle_timeout,
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Wait for the next field header.
    pub async fn next_field<'a>(
        &self,
        multipart: &'a mut Multipart,
    ) -> Result<Option<Field<'a>>, UploadError> {
        tokio::time::timeout(self.idle_timeout, multipart.next_field())
            .await
            .map_err(|_| UploadError::Stalled)?
            .map_err(|e| classify_multipart_error(e, self.max_bytes))
    }

    pub fn classify(&self, field: &Field<'_>) -> FieldRole {
        if field.name() == Some(self.field_name.as_str()) {
            FieldRole::Upload(FileMeta {
                file_name: field.file_name().map(str::to_owned),
                content_type: field.content_type().map(str::to_owned),
            })
        } else if field.file_name().is_some() {
            FieldRole::UnexpectedFile
        } else {
            FieldRole::Text
        }
    }

    /// The upload field's bytes, capped at `max_bytes`.
    pub fn body<'a>(&self, field: Field<'a>) -> impl Stream<Item = Result<Bytes, UploadError>> + Send + 'a {
        let max_bytes = self.max_bytes;
        let source = field.map_err(move |e| classify_multipart_error(e, max_bytes));
        bounded(source, max_bytes, self.idle_timeout)
    }

    /// Read and discard a field the pipeline does not use.
    pub async fn drain(&self, mut field: Field<'_>) -> Result<(), UploadError> {
        loop {
            let chunk = tokio::time::timeout(self.idle_timeout, field.chunk())
                .await
                .map_err(|_| UploadError::Stalled)?
                .map_err(|e| classify_multipart_error(e, self.max_bytes))?;
            if chunk.is_none() {
                return Ok(());
            }
        }
    }
}

/// Pass chunks through until more than `limit` bytes have been seen.
///
/// The stream ends after the first error; the source is dropped with it.
pub fn bounded<'a, S>(
    source: S,
    limit: u64,
    idle_timeout: Duration,
) -> impl Stream<Item = Result<Bytes, UploadError>> + Send + 'a
where
    S: Stream<Item = Result<Bytes, UploadError>> + Send + 'a,
{
    stream::unfold(Some((Box::pin(source), 0u64)), move |state| async move {
        let Some((mut source, seen)) = state else {
            return None;
        };
        match tokio::time::timeout(idle_timeout, source.next()).await {
            Err(_) => Some((Err(UploadError::Stalled), None)),
            Ok(None) => None,
            Ok(Some(Err(e))) => Some((Err(e), None)),
            Ok(Some(Ok(chunk))) => {
                let seen = seen.saturating_add(chunk.len() as u64);
                if seen > limit {
                    Some((Err(UploadError::TooLarge { limit }), None))
                } else {
                    Some((Ok(chunk), Some((source, seen))))
                }
            }
        }
    })
}

/// Map a multipart parse failure onto the pipeline taxonomy.
///
/// The request-wide body ceiling surfaces as 413 from axum; everything else
/// is a broken form.
fn classify_multipart_error(error: MultipartError, max_bytes: u64) -> UploadError {
    tracing::debug!(error = %error, "Multipart decoding failed");
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::TooLarge { limit: max_bytes }
    } else {
        UploadError::Malformed("unreadable multipart body")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(sizes: &[usize]) -> impl Stream<Item = Result<Bytes, UploadError>> + Send + 'static {
        let items: Vec<_> = sizes.iter().map(|n| Ok(Bytes::from(vec![7u8; *n]))).collect();
        stream::iter(items)
    }

    async fn collect(
        s: impl Stream<Item = Result<Bytes, UploadError>>,
    ) -> (u64, Option<UploadError>) {
        let mut s = std::pin::pin!(s);
        let mut total = 0u64;
        while let Some(item) = s.next().await {
            match item {
                Ok(chunk) => total += chunk.len() as u64,
                Err(e) => return (total, Some(e)),
            }
        }
        (total, None)
    }

    #[tokio::test]
    async fn passes_bodies_up_to_the_limit() {
        let (total, err) = collect(bounded(chunks(&[4, 4, 2]), 10, Duration::from_secs(1))).await;
        assert_eq!(total, 10);
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn stops_at_the_chunk_that_crosses_the_limit() {
        let (total, err) = collect(bounded(chunks(&[4, 4, 4, 4]), 10, Duration::from_secs(1))).await;
        assert_eq!(total, 8);
        assert!(matches!(err, Some(UploadError::TooLarge { limit: 10 })));
    }

    #[tokio::test]
    async fn nothing_is_yielded_after_an_error() {
        let s = bounded(chunks(&[11, 1]), 10, Duration::from_secs(1));
        let items: Vec<_> = s.collect().await;
        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
    }

    #[tokio::test]
    async fn source_errors_pass_through() {
        let source = stream::iter(vec![
            Ok(Bytes::from_static(b"abc")),
            Err(UploadError::Malformed("boom")),
            Ok(Bytes::from_static(b"never")),
        ]);
        let (total, err) = collect(bounded(source, 100, Duration::from_secs(1))).await;
        assert_eq!(total, 3);
        assert!(matches!(err, Some(UploadError::Malformed("boom"))));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_source_is_reported_as_stalled() {
        let source = stream::iter(vec![Ok(Bytes::from_static(b"abc"))]).chain(stream::pending());
        let (total, err) = collect(bounded(source, 100, Duration::from_secs(5))).await;
        assert_eq!(total, 3);
        assert!(matches!(err, Some(UploadError::Stalled)));
    }
}
