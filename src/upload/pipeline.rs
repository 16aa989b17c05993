//! The admission pipeline for one upload request.
//!
//! Stages run in order and the first failure ends the run:
//! throttle → multipart decode → type check → name → storage → commit.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::extract::multipart::MultipartRejection;
use axum::extract::Multipart;

use super::admission::AdmissionFilter;
use super::decoder::{FieldRole, MultipartDecoder};
use super::error::UploadError;
use super::sanitize::NameSanitizer;
use super::storage::{PendingFile, StorageWriter, StoredFile};
use crate::clock::Clock;
use crate::config::IntakeConfig;
use crate::observability::metrics;
use crate::security::rate_limit::{ClientThrottle, ThrottleDecision, ThrottleSettings};

/// Everything a finished run produced.
#[derive(Debug)]
pub struct PipelineRun {
    /// Quota state after counting this request; `None` when throttling is off.
    pub quota: Option<ThrottleDecision>,
    pub result: Result<StoredFile, UploadError>,
}

/// Admission pipeline shared by all requests.
pub struct UploadPipeline {
    throttle: Option<Arc<ClientThrottle>>,
    decoder: MultipartDecoder,
    admission: ArcSwap<AdmissionFilter>,
    sanitizer: NameSanitizer,
    storage: StorageWriter,
    /// Total time a request may spend past the throttle.
    deadline: Duration,
}

impl UploadPipeline {
    pub fn from_config(config: &IntakeConfig, clock: Arc<dyn Clock>) -> Self {
        let upload = &config.upload;
        let throttle = config.rate_limit.enabled.then(|| {
            Arc::new(ClientThrottle::new(
                ThrottleSettings::from(&config.rate_limit),
                clock.clone(),
            ))
        });

        Self {
            throttle,
            decoder: MultipartDecoder::new(
                upload.field_name.clone(),
                upload.max_upload_bytes,
                Duration::from_secs(upload.read_idle_timeout_secs),
            ),
            admission: ArcSwap::from_pointee(AdmissionFilter::new(upload.allowed_mime_types.iter().cloned())),
            sanitizer: NameSanitizer::new(clock),
            storage: StorageWriter::new(&upload.upload_dir),
            deadline: Duration::from_secs(config.timeouts.request_secs),
        }
    }

    pub fn throttle(&self) -> Option<&Arc<ClientThrottle>> {
        self.throttle.as_ref()
    }

    /// Apply the settings that can change without a restart.
    pub fn apply_update(&self, config: &IntakeConfig) {
        let admission = AdmissionFilter::new(config.upload.allowed_mime_types.iter().cloned());
        if **self.admission.load() != admission {
            tracing::info!(allowed = ?admission.allowed(), "Allowed upload types updated");
            self.admission.store(Arc::new(admission));
        }

        if let Some(throttle) = &self.throttle {
            let settings = ThrottleSettings::from(&config.rate_limit);
            if throttle.settings() != settings {
                throttle.reconfigure(settings);
            }
        }
    }

    /// Run one request from `client` through every stage.
    pub async fn run(
        &self,
        client: &str,
        multipart: Result<Multipart, MultipartRejection>,
    ) -> PipelineRun {
        let started = Instant::now();
        let quota = self.throttle.as_ref().map(|throttle| throttle.check(client));

        let result = match quota {
            Some(decision) if !decision.allowed => {
                tracing::warn!(client = %client, "Rate limit exceeded");
                metrics::record_throttled();
                Err(UploadError::ThrottleExceeded {
                    retry_after: decision.reset_after,
                })
            }
            _ => tokio::time::timeout(self.deadline, self.accept(multipart))
                .await
                .unwrap_or(Err(UploadError::Stalled)),
        };

        match &result {
            Ok(stored) => tracing::info!(
                client = %client,
                filename = %stored.filename,
                size = stored.size,
                "Upload stored"
            ),
            Err(e) if e.is_client_error() => tracing::info!(
                client = %client,
                reason = e.kind(),
                detail = %e,
                "Upload rejected"
            ),
            Err(_) => {}
        }
        metrics::record_upload(&result, started);

        PipelineRun { quota, result }
    }

    async fn accept(
        &self,
        multipart: Result<Multipart, MultipartRejection>,
    ) -> Result<StoredFile, UploadError> {
        let mut multipart = multipart.map_err(|rejection| {
            tracing::debug!(error = %rejection, "Request is not multipart/form-data");
            UploadError::Malformed("expected a multipart/form-data body")
        })?;

        let mut pending: Option<PendingFile> = None;
        while let Some(field) = self.decoder.next_field(&mut multipart).await? {
            match self.decoder.classify(&field) {
                FieldRole::Upload(meta) => {
                    if pending.is_some() {
                        return Err(UploadError::Malformed("more than one file in the upload field"));
                    }
                    self.admission.load().check_type(meta.content_type.as_deref())?;
                    let safe_name = self.sanitizer.sanitize(meta.file_name.as_deref().unwrap_or(""));
                    let staged = self.storage.write(&safe_name, self.decoder.body(field)).await?;
                    pending = Some(staged);
                }
                FieldRole::UnexpectedFile => {
                    return Err(UploadError::Malformed("unexpected file field"));
                }
                FieldRole::Text => self.decoder.drain(field).await?,
            }
        }

        pending
            .ok_or(UploadError::Malformed("missing upload field"))?
            .commit()
            .await
    }
}
