//! HTTP request handlers for the image stream API.
//!
//! # Endpoints
//!
//! - `POST /?<params>` - Process the image in the request body
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error, warn};
use url::Url;

use crate::codec::ImageCodec;
use crate::config::ProcessingConfig;
use crate::error::StreamError;
use crate::io::{BufferSink, MemorySource};
use crate::query::QueryStore;
use crate::status::{redirect_target, Status};
use crate::stream::Stream;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state: the codec engine and the read-only processing
/// configuration.
pub struct AppState<C: ImageCodec> {
    pub codec: Arc<C>,
    pub config: Arc<ProcessingConfig>,
}

impl<C: ImageCodec> AppState<C> {
    pub fn new(codec: C, config: ProcessingConfig) -> Self {
        Self {
            codec: Arc::new(codec),
            config: Arc::new(config),
        }
    }
}

impl<C: ImageCodec> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            codec: Arc::clone(&self.codec),
            config: Arc::clone(&self.config),
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// A failed request: the JSON status body, plus a redirect target when the
/// request asked for one.
#[derive(Debug)]
pub struct ErrorResponse {
    pub status: Status,
    pub redirect: Option<Url>,
}

impl ErrorResponse {
    pub fn new(status: Status) -> Self {
        Self {
            status,
            redirect: None,
        }
    }

    pub fn with_redirect(mut self, redirect: Option<Url>) -> Self {
        self.redirect = redirect;
        self
    }
}

impl From<StreamError> for ErrorResponse {
    fn from(err: StreamError) -> Self {
        ErrorResponse::new(Status::from(&err))
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = self.status.http_status();
        let error_type = self.status.error_type();
        let message = &self.status.message;

        // Log errors based on severity
        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let body = self.status.to_json();
        let mut response = (
            status,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response();

        if let Some(location) = self
            .redirect
            .and_then(|url| HeaderValue::from_str(url.as_str()).ok())
        {
            debug!(location = ?location, "Redirecting failed request");
            *response.status_mut() = StatusCode::FOUND;
            response.headers_mut().insert(header::LOCATION, location);
        }

        response
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle image processing requests.
///
/// # Endpoint
///
/// `POST /?w=300&h=200&output=webp`
///
/// The request body is the source image; the query string carries the
/// processing parameters.
///
/// # Response
///
/// - `200 OK`: encoded image with the output `Content-Type`
/// - `400 Bad Request`: output format disabled
/// - `413 Payload Too Large`: page or pixel limit exceeded
/// - `415 Unsupported Media Type`: source is not a recognised image
/// - `422 Unprocessable Entity`: source could not be decoded
/// - `504 Gateway Timeout`: processing time limit exceeded
/// - `302 Found`: any of the above when `default` names a redirect target
pub async fn process_handler<C>(
    State(state): State<AppState<C>>,
    RawQuery(raw_query): RawQuery,
    body: Bytes,
) -> Result<Response, ErrorResponse>
where
    C: ImageCodec + 'static,
{
    let query = QueryStore::parse(raw_query.as_deref().unwrap_or_default());
    let redirect = redirect_target(&query);

    let result = tokio::task::spawn_blocking(move || {
        let mut query = query;
        let mut source = MemorySource::new(body, "request body");
        let mut sink = BufferSink::new();
        let stream = Stream::new(state.codec.as_ref(), state.config.as_ref());
        stream
            .process(&mut source, &mut query, &mut sink)
            .map(|processed| (processed, sink.into_bytes()))
    })
    .await;

    let (processed, data) = match result {
        Ok(Ok(output)) => output,
        Ok(Err(err)) => return Err(ErrorResponse::from(err).with_redirect(redirect)),
        Err(join_err) => {
            let status = Status::new(500, format!("Processing task failed: {}", join_err));
            return Err(ErrorResponse::new(status).with_redirect(redirect));
        }
    };

    debug!(
        output = %processed.output,
        bytes = data.len(),
        "Processed image"
    );

    Ok(([(header::CONTENT_TYPE, processed.mime_type)], data).into_response())
}

/// Handle health check requests.
///
/// `200 OK` with `{"status": "healthy", "version": "..."}`.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
