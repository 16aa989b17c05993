//! Configuration validation.
//!
//! Serde handles the syntax; this module checks value ranges and formats.
//! All problems are reported together, not just the first one.

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::IntakeConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `upload.max_upload_bytes`.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration before it is accepted into the system.
pub fn validate_config(config: &IntakeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    let upload = &config.upload;
    if upload.max_upload_bytes == 0 {
        errors.push(ValidationError::new("upload.max_upload_bytes", "must be greater than 0"));
    }
    if upload.allowed_mime_types.is_empty() {
        errors.push(ValidationError::new("upload.allowed_mime_types", "must not be empty"));
    }
    for mime in &upload.allowed_mime_types {
        if !is_mime_shaped(mime) {
            errors.push(ValidationError::new(
                "upload.allowed_mime_types",
                format!("'{}' is not of the form type/subtype", mime),
            ));
        }
    }
    if upload.upload_dir.trim().is_empty() {
        errors.push(ValidationError::new("upload.upload_dir", "must not be empty"));
    }
    if upload.field_name.is_empty() {
        errors.push(ValidationError::new("upload.field_name", "must not be empty"));
    }
    if upload.read_idle_timeout_secs == 0 {
        errors.push(ValidationError::new("upload.read_idle_timeout_secs", "must be greater than 0"));
    }

    let rate_limit = &config.rate_limit;
    if rate_limit.window_ms == 0 {
        errors.push(ValidationError::new("rate_limit.window_ms", "must be greater than 0"));
    }
    if rate_limit.max_requests == 0 {
        errors.push(ValidationError::new("rate_limit.max_requests", "must be greater than 0"));
    }
    if rate_limit.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("rate_limit.sweep_interval_secs", "must be greater than 0"));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_mime_shaped(value: &str) -> bool {
    match value.split_once('/') {
        Some((kind, subtype)) => {
            !kind.is_empty()
                && !subtype.is_empty()
                && !subtype.contains('/')
                && value.chars().all(|c| c.is_ascii_graphic())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&IntakeConfig::default()).is_ok());
    }

    #[test]
    fn reports_every_problem() {
        let mut config = IntakeConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.upload.max_upload_bytes = 0;
        config.upload.allowed_mime_types = vec!["image".into(), "image/png".into()];
        config.rate_limit.max_requests = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "upload.max_upload_bytes",
                "upload.allowed_mime_types",
                "rate_limit.max_requests",
            ]
        );
    }

    #[test]
    fn empty_allow_list_is_rejected() {
        let mut config = IntakeConfig::default();
        config.upload.allowed_mime_types.clear();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].to_string(), "upload.allowed_mime_types: must not be empty");
    }

    #[test]
    fn mime_shape() {
        assert!(is_mime_shaped("image/png"));
        assert!(!is_mime_shaped("image/"));
        assert!(!is_mime_shaped("/png"));
        assert!(!is_mime_shaped("image/png/x"));
        assert!(!is_mime_shaped("image/ png"));
    }
}
