//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the upload handler
//! - Wire up middleware (request ID, tracing, body ceiling, headers)
//! - Run the throttle sweeper and apply live config updates
//! - Serve until shutdown is signalled

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{multipart::MultipartRejection, ConnectInfo, DefaultBodyLimit, Multipart, Request, State},
    http::HeaderMap,
    routing::post,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::clock::{Clock, SystemClock};
use crate::config::watcher::restart_only_changes;
use crate::config::IntakeConfig;
use crate::http::request::{client_identity, propagate_request_id_layer, set_request_id_layer, X_REQUEST_ID};
use crate::security::headers::with_security_headers;
use crate::security::limits::body_ceiling;
use crate::security::rate_limit::spawn_sweeper;
use crate::upload::{UploadPipeline, UploadResponse};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<UploadPipeline>,
    pub trust_forwarded_for: bool,
}

/// HTTP server for the intake service.
pub struct HttpServer {
    router: Router,
    config: IntakeConfig,
    pipeline: Arc<UploadPipeline>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: IntakeConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a server whose throttle and file names follow `clock`.
    pub fn with_clock(config: IntakeConfig, clock: Arc<dyn Clock>) -> Self {
        let pipeline = Arc::new(UploadPipeline::from_config(&config, clock));
        let state = AppState {
            pipeline: pipeline.clone(),
            trust_forwarded_for: config.rate_limit.trust_forwarded_for,
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            pipeline,
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The total request deadline is enforced by the pipeline, so a late
    /// request still gets the regular 408 body and quota headers.
    fn build_router(config: &IntakeConfig, state: AppState) -> Router {
        let router = Router::new()
            .route(
                "/upload",
                post(upload_handler)
                    .layer(DefaultBodyLimit::max(body_ceiling(config.upload.max_upload_bytes))),
            )
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
                        let request_id = request
                            .headers()
                            .get(X_REQUEST_ID)
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("unknown");
                        tracing::info_span!(
                            "request",
                            method = %request.method(),
                            uri = %request.uri(),
                            request_id = %request_id,
                        )
                    }))
                    .layer(propagate_request_id_layer()),
            );

        if config.security.enable_headers {
            with_security_headers(router)
        } else {
            router
        }
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Config updates received on `config_updates` are applied live where
    /// possible. Returns once `shutdown` fires and in-flight requests finish.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<IntakeConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upload_dir = %self.config.upload.upload_dir,
            max_upload_bytes = self.config.upload.max_upload_bytes,
            "HTTP server starting"
        );

        if let Some(throttle) = self.pipeline.throttle() {
            spawn_sweeper(
                throttle.clone(),
                Duration::from_secs(self.config.rate_limit.sweep_interval_secs),
                shutdown.resubscribe(),
            );
        }

        let pipeline = self.pipeline.clone();
        let running = self.config.clone();
        let mut updates_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = config_updates.recv() => match update {
                        Some(next) => {
                            let ignored = restart_only_changes(&running, &next);
                            if !ignored.is_empty() {
                                tracing::warn!(fields = ?ignored, "Config changes require a restart and were not applied");
                            }
                            pipeline.apply_update(&next);
                        }
                        None => break,
                    },
                    _ = updates_shutdown.recv() => break,
                }
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The router, for serving or driving directly in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &IntakeConfig {
        &self.config
    }
}

/// `POST /upload`.
///
/// The multipart extractor's own rejection is handed to the pipeline so the
/// throttle still runs first and the response uses our wording.
async fn upload_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> UploadResponse {
    let client = client_identity(peer, &headers, state.trust_forwarded_for);
    UploadResponse::from(state.pipeline.run(&client, multipart).await)
}
