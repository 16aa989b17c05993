//! Request body limits.
//!
//! The pipeline bounds the file itself while streaming. The whole request
//! body gets a second, slightly larger ceiling so text fields and multipart
//! framing cannot be used to push unbounded data through the decoder.

/// Room left for boundaries, part headers and small text fields.
pub const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

/// Largest request body accepted on the upload route.
pub fn body_ceiling(max_upload_bytes: u64) -> usize {
    usize::try_from(max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES)).unwrap_or(usize::MAX)
}
