//! API integration tests for image processing and error handling.
//!
//! Tests verify:
//! - Image processing through `POST /`
//! - Error statuses and JSON error bodies, including the timeout
//! - Error redirects via `default`
//! - Health endpoint and body limit

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use image_stream::codec::RasterCodec;
use image_stream::config::ProcessingConfig;
use image_stream::query::{Output, Savers};
use image_stream::{create_router, RouterConfig};

use super::test_utils::{create_garbage, create_gif, create_png, MockCodec};

fn raster_router(config: ProcessingConfig) -> Router {
    create_router(
        RasterCodec::new(),
        config,
        RouterConfig::new().with_tracing(false),
    )
}

fn post(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::from(body))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

// =============================================================================
// Processing
// =============================================================================

#[tokio::test]
async fn test_resize_png_to_jpeg() {
    let router = raster_router(ProcessingConfig::default());

    let response = router
        .oneshot(post("/?w=20&output=jpg", create_png(80, 40, false)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/jpeg"
    );

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let decoded = image::load_from_memory(&body).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (20, 10));
}

#[tokio::test]
async fn test_origin_output_without_query() {
    let router = raster_router(ProcessingConfig::default());

    let response = router
        .oneshot(post("/", create_png(8, 8, true)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/png"
    );
}

#[tokio::test]
async fn test_json_metadata() {
    let router = raster_router(ProcessingConfig::default());

    let response = router
        .oneshot(post("/?n=-1&output=json", create_gif(10, 5, 4, 100)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );

    let json = body_json(response).await;
    assert_eq!(json["format"], "gif");
    assert_eq!(json["pages"], 4);
    assert_eq!(json["page_height"], 5);
    assert_eq!(json["height"], 20);
}

// =============================================================================
// Errors
// =============================================================================

#[tokio::test]
async fn test_invalid_image_415() {
    let router = raster_router(ProcessingConfig::default());

    let response = router.oneshot(post("/", create_garbage())).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    let json = body_json(response).await;
    assert_eq!(json["status"], 415);
    assert!(json["message"].is_string());
}

#[tokio::test]
async fn test_unreadable_image_422() {
    let router = raster_router(ProcessingConfig::default());
    let mut data = create_png(16, 16, false);
    data.truncate(24);

    let response = router.oneshot(post("/", data)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_pixel_limit_413() {
    let router = raster_router(ProcessingConfig {
        limit_input_pixels: 100,
        ..ProcessingConfig::default()
    });

    let response = router
        .oneshot(post("/", create_png(20, 20, false)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let json = body_json(response).await;
    assert_eq!(
        json["message"],
        "Input image exceeds pixel limit. Width x height should be less than 100"
    );
}

#[tokio::test]
async fn test_page_limit_413() {
    let router = create_router(
        MockCodec::new(&[(10, 10); 8]),
        ProcessingConfig {
            max_pages: 4,
            ..ProcessingConfig::default()
        },
        RouterConfig::new().with_tracing(false),
    );

    let response = router.oneshot(post("/?n=-1", vec![0u8; 8])).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_timeout_504() {
    let router = create_router(
        MockCodec::new(&[(10, 10)]).with_delays(Duration::ZERO, Duration::from_millis(1100)),
        ProcessingConfig {
            process_timeout: 1,
            ..ProcessingConfig::default()
        },
        RouterConfig::new().with_tracing(false),
    );

    let response = router.oneshot(post("/?w=5", vec![0u8; 8])).await.unwrap();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    let json = body_json(response).await;
    assert_eq!(json["status"], 504);
    assert_eq!(
        json["message"],
        "Maximum image processing time of 1 seconds exceeded"
    );
}

#[tokio::test]
async fn test_disabled_saver_400() {
    let router = raster_router(ProcessingConfig {
        savers: Savers::all().without(Output::Webp),
        ..ProcessingConfig::default()
    });

    let response = router
        .oneshot(post("/?output=webp", create_png(4, 4, false)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["status"], 400);
    assert_eq!(
        json["message"],
        "Saving to webp is disabled. Supported savers: jpg, png, avif, tiff, gif, json"
    );
}

// =============================================================================
// Redirects
// =============================================================================

#[tokio::test]
async fn test_error_redirect_to_default() {
    let router = raster_router(ProcessingConfig::default());

    let response = router
        .oneshot(post(
            "/?default=https%3A%2F%2Fexample.org%2Ffallback.png",
            create_garbage(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "https://example.org/fallback.png"
    );

    // The JSON body is still sent
    let json = body_json(response).await;
    assert_eq!(json["status"], 415);
}

#[tokio::test]
async fn test_error_redirect_to_url() {
    let router = raster_router(ProcessingConfig::default());

    let response = router
        .oneshot(post("/?default=1&url=example.com/image.jpg", create_garbage()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "http://example.com/image.jpg"
    );
}

#[tokio::test]
async fn test_invalid_redirect_ignored() {
    let router = raster_router(ProcessingConfig::default());

    let response = router
        .oneshot(post("/?default=ftp://example.org/x", create_garbage()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(response.headers().get(header::LOCATION).is_none());
}

#[tokio::test]
async fn test_success_ignores_redirect() {
    let router = raster_router(ProcessingConfig::default());

    let response = router
        .oneshot(post(
            "/?default=https://example.org/x.png",
            create_png(4, 4, false),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Server
// =============================================================================

#[tokio::test]
async fn test_health() {
    let router = raster_router(ProcessingConfig::default());

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_body_limit() {
    let router = create_router(
        RasterCodec::new(),
        ProcessingConfig::default(),
        RouterConfig::new()
            .with_tracing(false)
            .with_max_body_size(64),
    );

    let response = router
        .oneshot(post("/", vec![0u8; 1024]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
