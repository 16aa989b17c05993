//! Photo intake service library.
//!
//! A single `POST /upload` endpoint that admits one image per request:
//! throttled per client, size-bounded while streaming, type-checked against
//! an allow-list, stored under a unique sanitized name.

pub mod clock;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;
pub mod upload;

pub use config::IntakeConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
