//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, client identity)
//!     → upload pipeline
//!     → security headers on the way out
//! ```

pub mod request;
pub mod server;

pub use request::{client_identity, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
