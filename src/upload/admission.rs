//! Declared MIME type allow-list.
//!
//! This is a policy check on the client-supplied `Content-Type` of the file
//! part. Nothing inspects the bytes, so an accepted upload is not guaranteed
//! to be a valid image.

use super::error::UploadError;

/// Exact-match allow-list of declared MIME types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionFilter {
    allowed: Vec<String>,
}

impl AdmissionFilter {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    /// Accept `declared` only if it equals one of the allowed types.
    ///
    /// No wildcards, no case folding, no parameter stripping.
    pub fn check_type(&self, declared: Option<&str>) -> Result<(), UploadError> {
        match declared {
            Some(mime) if self.allowed.iter().any(|allowed| allowed == mime) => Ok(()),
            _ => Err(UploadError::UnsupportedType {
                declared: declared.map(str::to_owned),
            }),
        }
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn images() -> AdmissionFilter {
        AdmissionFilter::new(["image/jpeg", "image/png"])
    }

    #[test]
    fn allowed_types_pass() {
        assert!(images().check_type(Some("image/jpeg")).is_ok());
        assert!(images().check_type(Some("image/png")).is_ok());
    }

    #[test]
    fn everything_else_is_unsupported() {
        for declared in [
            "application/pdf",
            "image/gif",
            "IMAGE/PNG",
            "image/png; charset=binary",
            "image/*",
            " image/png",
            "",
        ] {
            match images().check_type(Some(declared)) {
                Err(UploadError::UnsupportedType { declared: Some(seen) }) => assert_eq!(seen, declared),
                other => panic!("{declared:?} gave {other:?}"),
            }
        }
    }

    #[test]
    fn missing_type_is_unsupported() {
        assert!(matches!(
            images().check_type(None),
            Err(UploadError::UnsupportedType { declared: None })
        ));
    }
}
