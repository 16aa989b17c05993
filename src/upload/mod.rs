//! Upload admission subsystem.
//!
//! # Data Flow
//! ```text
//! POST /upload
//!     → pipeline.rs (throttle check, stage ordering)
//!     → decoder.rs (multipart fields, streaming byte ceiling)
//!     → admission.rs (declared MIME allow-list)
//!     → sanitize.rs (unique storage-safe name)
//!     → storage.rs (temp file, then publish)
//!     → response.rs (status + fixed message)
//! ```
//!
//! # Design Decisions
//! - Every stage returns `Result<_, UploadError>`; only response.rs turns
//!   errors into HTTP
//! - The type check runs before any byte is written
//! - Nothing is buffered whole; oversized bodies are cut off mid-stream

pub mod admission;
pub mod decoder;
pub mod error;
pub mod pipeline;
pub mod response;
pub mod sanitize;
pub mod storage;

pub use admission::AdmissionFilter;
pub use decoder::{FileMeta, MultipartDecoder};
pub use error::UploadError;
pub use pipeline::{PipelineRun, UploadPipeline};
pub use response::{PipelineOutcome, Rejection, UploadResponse};
pub use sanitize::NameSanitizer;
pub use storage::{PendingFile, StorageWriter, StoredFile};
