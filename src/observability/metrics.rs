//! Metrics collection and exposition.
//!
//! # Metrics
//! - `intake_uploads_total` (counter): finished requests by `outcome`
//! - `intake_upload_duration_seconds` (histogram): time spent in the pipeline by `outcome`
//! - `intake_upload_bytes_total` (counter): bytes published to the upload directory
//! - `intake_throttled_total` (counter): requests refused by the throttle
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::upload::{StoredFile, UploadError};

/// Install the Prometheus exporter with its own scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_upload(result: &Result<StoredFile, UploadError>, started: Instant) {
    let outcome = match result {
        Ok(_) => "stored",
        Err(e) => e.kind(),
    };
    counter!("intake_uploads_total", "outcome" => outcome).increment(1);
    histogram!("intake_upload_duration_seconds", "outcome" => outcome)
        .record(started.elapsed().as_secs_f64());

    if let Ok(stored) = result {
        counter!("intake_upload_bytes_total").increment(stored.size);
    }
}

pub fn record_throttled() {
    counter!("intake_throttled_total").increment(1);
}
