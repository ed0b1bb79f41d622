//! Router configuration for the image stream server.
//!
//! # Route Structure
//!
//! ```text
//! /health     - Health check
//! /           - POST an image, get the processed image back
//! ```
//!
//! # Example
//!
//! ```ignore
//! use image_stream::codec::RasterCodec;
//! use image_stream::config::ProcessingConfig;
//! use image_stream::server::{create_router, RouterConfig};
//!
//! let config = RouterConfig::new()
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//!
//! let router = create_router(RasterCodec::new(), ProcessingConfig::default(), config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{health_handler, process_handler, AppState};
use crate::codec::ImageCodec;
use crate::config::{ProcessingConfig, DEFAULT_MAX_BODY_SIZE};

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Whether to enable request tracing
    pub enable_tracing: bool,

    /// Maximum request body size in bytes
    pub max_body_size: usize,
}

impl RouterConfig {
    /// Any CORS origin, tracing on, default body limit.
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            enable_tracing: true,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    pub fn with_max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the application router over `codec` with the given processing
/// configuration.
pub fn create_router<C>(codec: C, processing: ProcessingConfig, config: RouterConfig) -> Router
where
    C: ImageCodec + 'static,
{
    let app_state = AppState::new(codec, processing);

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/", post(process_handler::<C>))
        .with_state(app_state)
        .layer(DefaultBodyLimit::max(config.max_body_size))
        .layer(build_cors_layer(&config));

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400)); // 24 hours

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}
