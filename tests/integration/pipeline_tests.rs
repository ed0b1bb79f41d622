//! Pipeline integration tests.
//!
//! Tests verify:
//! - Loader identification and the buffer-sniff fallback
//! - Page window resolution, largest/smallest probing and re-decoding
//! - Page and pixel limits, and when they apply
//! - Geometry handed to the codec
//! - Save options and JSON output
//! - The process timeout across page scans, transform and encode
//! - Reading a file source once

use std::io::{Cursor, Read, Seek, SeekFrom};
use std::time::{Duration, Instant};

use image::AnimationDecoder;

use image_stream::codec::{OptionValue, RasterCodec};
use image_stream::config::ProcessingConfig;
use image_stream::error::StreamError;
use image_stream::io::{BufferSink, MemorySource, ReaderSource};
use image_stream::query::{ImageType, Output, QueryStore, Savers};
use image_stream::stream::{Processed, Stream};

use super::test_utils::{
    create_garbage, create_gif, create_jpeg, create_png, create_tall_tiff, create_tiff, MockCodec,
};

fn run_mock(
    codec: &MockCodec,
    query: &str,
    config: &ProcessingConfig,
) -> (Result<Processed, StreamError>, QueryStore, BufferSink) {
    let mut source = MemorySource::new(b"MOCK-IMAGE".to_vec(), "mock");
    let mut query = QueryStore::parse(query);
    let mut sink = BufferSink::new();
    let result = Stream::new(codec, config).process(&mut source, &mut query, &mut sink);
    (result, query, sink)
}

fn run_raster(
    data: Vec<u8>,
    query: &str,
    config: &ProcessingConfig,
) -> (Result<Processed, StreamError>, QueryStore, BufferSink) {
    let codec = RasterCodec::new();
    let mut source = MemorySource::new(data, "fixture");
    let mut query = QueryStore::parse(query);
    let mut sink = BufferSink::new();
    let result = Stream::new(&codec, config).process(&mut source, &mut query, &mut sink);
    (result, query, sink)
}

fn default_config() -> ProcessingConfig {
    ProcessingConfig::default()
}

// =============================================================================
// Loader Identification
// =============================================================================

#[test]
fn test_type_recorded_from_source_loader() {
    let codec = MockCodec::new(&[(10, 10)]).with_loaders(Some("webpload_source"), None);
    let (result, query, _) = run_mock(&codec, "", &default_config());

    assert!(result.is_ok());
    assert_eq!(query.get("type", ImageType::Unknown), ImageType::Webp);
}

#[test]
fn test_buffer_sniff_fallback() {
    let codec = MockCodec::new(&[(10, 10)]).with_loaders(None, Some("pngload_buffer"));
    let (result, query, _) = run_mock(&codec, "", &default_config());

    assert_eq!(result.unwrap().output, Output::Png);
    assert_eq!(query.get("type", ImageType::Unknown), ImageType::Png);
}

#[test]
fn test_no_loader_is_invalid_image() {
    let codec = MockCodec::new(&[(10, 10)]).with_loaders(None, None);
    let (result, _, sink) = run_mock(&codec, "", &default_config());

    assert!(matches!(result, Err(StreamError::InvalidImage { .. })));
    assert!(codec.loads().is_empty());
    assert!(sink.extension().is_none());
}

#[test]
fn test_raster_garbage_is_invalid_image() {
    let (result, _, _) = run_raster(create_garbage(), "", &default_config());
    assert!(matches!(result, Err(StreamError::InvalidImage { .. })));
}

// =============================================================================
// Load Options
// =============================================================================

#[test]
fn test_sequential_access_by_default() {
    let codec = MockCodec::new(&[(10, 10)]);
    run_mock(&codec, "", &default_config()).0.unwrap();

    let loads = codec.loads();
    assert_eq!(loads.len(), 1);
    assert_eq!(loads[0].get_str("access"), Some("sequential"));
    assert_eq!(loads[0].get_bool("fail"), Some(false));
    assert!(!loads[0].contains("page"));
}

#[test]
fn test_trim_forces_random_access() {
    let codec = MockCodec::new(&[(10, 10)]);
    run_mock(&codec, "trim=10", &default_config()).0.unwrap();
    assert_eq!(codec.loads()[0].get_str("access"), Some("random"));
}

#[test]
fn test_fail_on_error_passed_to_loader() {
    let codec = MockCodec::new(&[(10, 10)]);
    let config = ProcessingConfig {
        fail_on_error: true,
        ..default_config()
    };
    run_mock(&codec, "", &config).0.unwrap();
    assert_eq!(codec.loads()[0].get_bool("fail"), Some(true));
}

// =============================================================================
// Page Resolution
// =============================================================================

#[test]
fn test_default_window_loads_once() {
    let codec = MockCodec::new(&[(10, 10), (20, 20)]);
    let (result, query, _) = run_mock(&codec, "", &default_config());

    result.unwrap();
    assert_eq!(codec.loads().len(), 1);
    assert_eq!(query.get("n", 0), 1);
    assert_eq!(query.get("page", -9), 0);
}

#[test]
fn test_largest_page_selected_and_reloaded() {
    // Areas 100, 400, 400, 50
    let codec = MockCodec::new(&[(10, 10), (20, 20), (40, 10), (5, 10)]);
    let (result, query, _) = run_mock(&codec, "page=-1", &default_config());

    result.unwrap();
    assert_eq!(query.get("page", -9), 1);
    assert_eq!(query.get("n", 0), 1);

    let loads = codec.loads();
    // Header load, three page scans, final decode
    assert_eq!(loads.len(), 5);
    let measured: Vec<_> = loads[1..4].iter().map(|o| o.get_int("page")).collect();
    assert_eq!(measured, vec![Some(1), Some(2), Some(3)]);
    assert_eq!(loads[4].get_int("page"), Some(1));
    assert_eq!(loads[4].get_int("n"), Some(1));
}

#[test]
fn test_smallest_page_selected() {
    let codec = MockCodec::new(&[(10, 10), (20, 20), (40, 10), (5, 10)]);
    let (result, query, _) = run_mock(&codec, "page=-2", &default_config());

    result.unwrap();
    assert_eq!(query.get("page", -9), 3);
    assert_eq!(query.get("input_width", 0), 5);
    assert_eq!(query.get("input_height", 0), 10);
}

#[test]
fn test_all_remaining_pages() {
    let codec = MockCodec::new(&[(10, 10); 4]);
    let (result, query, _) = run_mock(&codec, "page=1&n=-1", &default_config());

    result.unwrap();
    assert_eq!(query.get("n", 0), 3);
    assert_eq!(query.get("page", -9), 1);
    assert_eq!(query.get("page_height", 0), 10);
    assert_eq!(query.get("input_height", 0), 30);

    let last = codec.loads().pop().unwrap();
    assert_eq!(last.get_int("n"), Some(3));
    assert_eq!(last.get_int("page"), Some(1));
}

#[test]
fn test_single_page_ignores_window() {
    let codec = MockCodec::new(&[(10, 10)]);
    let config = ProcessingConfig {
        max_pages: 1,
        ..default_config()
    };
    let (result, query, _) = run_mock(&codec, "page=-1&n=-1", &config);

    result.unwrap();
    assert_eq!(codec.loads().len(), 1);
    assert_eq!(query.get("page", -9), 0);
}

#[test]
fn test_page_past_end_is_unreadable() {
    // page == n_pages passes validation, the decoder rejects it
    let codec = MockCodec::new(&[(10, 10), (10, 10)]);
    let (result, _, _) = run_mock(&codec, "page=2", &default_config());
    assert!(matches!(result, Err(StreamError::UnreadableImage { .. })));
}

// =============================================================================
// Limits
// =============================================================================

#[test]
fn test_page_limit_checked_before_page_scan() {
    let codec = MockCodec::new(&[(10, 10); 4]);
    let config = ProcessingConfig {
        max_pages: 2,
        ..default_config()
    };
    let (result, _, sink) = run_mock(&codec, "n=3", &config);

    let err = result.unwrap_err();
    assert!(matches!(err, StreamError::TooLargeImage { .. }));
    assert_eq!(
        err.to_string(),
        "Input image exceeds the maximum number of pages. Number of pages should be less than 2"
    );
    assert_eq!(codec.loads().len(), 1);
    assert!(sink.extension().is_none());
}

#[test]
fn test_page_limit_skipped_for_default_window() {
    let codec = MockCodec::new(&[(10, 10); 4]);
    let config = ProcessingConfig {
        max_pages: 1,
        ..default_config()
    };
    assert!(run_mock(&codec, "", &config).0.is_ok());
}

#[test]
fn test_pixel_limit_uses_final_decode() {
    let codec = MockCodec::new(&[(10, 10); 4]);
    let config = ProcessingConfig {
        limit_input_pixels: 300,
        ..default_config()
    };

    // One page is 100 pixels
    assert!(run_mock(&codec, "", &config).0.is_ok());

    // Four stacked pages are 400 pixels
    let (result, _, _) = run_mock(&codec, "n=-1", &config);
    assert_eq!(
        result.unwrap_err().to_string(),
        "Input image exceeds pixel limit. Width x height should be less than 300"
    );
}

#[test]
fn test_stacked_height_beyond_u32_is_too_large() {
    // Two pages of 2^31 rows stack to 2^32
    let codec = MockCodec::new(&[(1, 1 << 31); 2]);
    let config = ProcessingConfig {
        limit_input_pixels: 0,
        ..default_config()
    };

    let (result, _, sink) = run_mock(&codec, "n=2&output=json", &config);
    assert!(matches!(result, Err(StreamError::TooLargeImage { .. })));
    assert!(sink.extension().is_none());
}

#[test]
fn test_raster_tall_tiff_window_hits_pixel_limit() {
    let data = create_tall_tiff(2, 1, 1 << 31);
    let (result, _, sink) = run_raster(data, "n=2&output=json", &default_config());

    assert_eq!(
        result.unwrap_err().to_string(),
        "Input image exceeds pixel limit. Width x height should be less than 71000000"
    );
    assert!(sink.extension().is_none());
}

// =============================================================================
// Timeout
// =============================================================================

fn one_second_timeout() -> ProcessingConfig {
    ProcessingConfig {
        process_timeout: 1,
        ..default_config()
    }
}

#[test]
fn test_timeout_stops_page_search() {
    let codec = MockCodec::new(&[(10, 10); 20])
        .with_delays(Duration::from_millis(400), Duration::ZERO);

    let started = Instant::now();
    let (result, _, sink) = run_mock(&codec, "page=-1&output=json", &one_second_timeout());

    assert!(matches!(result, Err(StreamError::Timeout { seconds: 1 })));
    assert!(codec.loads().len() < 5);
    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(codec.transforms().is_empty());
    assert!(sink.extension().is_none());
}

#[test]
fn test_timeout_during_transform() {
    let codec = MockCodec::new(&[(10, 10)])
        .with_delays(Duration::ZERO, Duration::from_millis(1100));

    let (result, _, sink) = run_mock(&codec, "w=5", &one_second_timeout());

    let err = result.unwrap_err();
    assert!(matches!(err, StreamError::Timeout { seconds: 1 }));
    assert_eq!(
        err.to_string(),
        "Maximum image processing time of 1 seconds exceeded"
    );
    assert!(codec.saves().is_empty());
    assert!(sink.extension().is_none());
}

#[test]
fn test_raster_animation_page_search_within_timeout() {
    let (result, query, sink) = run_raster(
        create_gif(16, 16, 60, 20),
        "page=-1&output=json",
        &one_second_timeout(),
    );

    result.unwrap();
    assert_eq!(query.get("page", -9), 0);

    let json: serde_json::Value = serde_json::from_slice(sink.data()).unwrap();
    assert_eq!(json["pages"], 60);
    assert_eq!(json["delay"], serde_json::json!([20]));
}

// =============================================================================
// File Source
// =============================================================================

/// Reader that counts the bytes handed out.
struct CountingReader {
    inner: Cursor<Vec<u8>>,
    read: usize,
}

impl Read for CountingReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.read += read;
        Ok(read)
    }
}

impl Seek for CountingReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.inner.seek(pos)
    }
}

#[test]
fn test_reader_source_read_once_across_page_search() {
    let data = create_tiff(&[(4, 4), (8, 8), (16, 8), (2, 2), (6, 6), (3, 3)]);
    let len = data.len();
    let reader = CountingReader {
        inner: Cursor::new(data),
        read: 0,
    };

    let codec = RasterCodec::new();
    let mut source = ReaderSource::new(reader, "counting");
    let mut query = QueryStore::parse("page=-1&output=json");
    let mut sink = BufferSink::new();
    Stream::new(&codec, &default_config())
        .process(&mut source, &mut query, &mut sink)
        .unwrap();

    assert_eq!(query.get("page", -9), 2);
    // One sniff plus one full read
    let read = source.into_inner().read;
    assert!(read <= len + 64, "read {} bytes of a {} byte file", read, len);
}

// =============================================================================
// Geometry
// =============================================================================

#[test]
fn test_rotated_orientation_swaps_target_box() {
    let codec = MockCodec::new(&[(1000, 800)]).with_orientation(6);
    run_mock(&codec, "w=300&h=200", &default_config()).0.unwrap();

    let transform = codec.transforms()[0];
    assert_eq!(transform.angle, 90);
    assert_eq!((transform.width, transform.height), (200, 300));
}

#[test]
fn test_precrop_keeps_target_box() {
    let codec = MockCodec::new(&[(1000, 800)]).with_orientation(6);
    run_mock(&codec, "w=300&h=200&precrop=true", &default_config())
        .0
        .unwrap();

    let transform = codec.transforms()[0];
    assert_eq!((transform.width, transform.height), (300, 200));
}

#[test]
fn test_percentage_and_pixel_ratio() {
    let codec = MockCodec::new(&[(400, 200)]);
    let (result, query, _) = run_mock(&codec, "w=50p&dpr=2", &default_config());

    result.unwrap();
    assert_eq!(query.get("w", 0), 400);
    assert_eq!(codec.transforms()[0].width, 400);
}

#[test]
fn test_mirror_overlay() {
    let codec = MockCodec::new(&[(10, 10)]).with_orientation(2);
    run_mock(&codec, "flop=true&ro=-90", &default_config())
        .0
        .unwrap();

    let transform = codec.transforms()[0];
    assert!(!transform.flop);
    assert_eq!(transform.angle, 270);
}

// =============================================================================
// Output
// =============================================================================

#[test]
fn test_save_options_for_animation() {
    let codec = MockCodec::new(&[(10, 10); 5]);
    let (result, _, sink) = run_mock(
        &codec,
        "n=-1&output=gif&delay=40&loop=2",
        &default_config(),
    );

    let processed = result.unwrap();
    assert_eq!(processed.extension, ".gif");
    assert_eq!(sink.data(), b"MOCK.gif");

    let (extension, options) = codec.saves().pop().unwrap();
    assert_eq!(extension, ".gif");
    assert_eq!(options.get_bool("strip"), Some(true));
    assert_eq!(options.get_int("effort"), Some(7));
    assert_eq!(options.get_int("page_height"), Some(10));
    assert_eq!(options.get_int("loop"), Some(2));
    assert_eq!(
        options.get("delay"),
        Some(&OptionValue::IntList(vec![40; 5]))
    );
}

#[test]
fn test_single_page_has_no_page_height() {
    let codec = MockCodec::new(&[(10, 10); 5]);
    run_mock(&codec, "output=webp", &default_config()).0.unwrap();

    let (_, options) = codec.saves().pop().unwrap();
    assert!(!options.contains("page_height"));
    assert_eq!(options.get_bool("lossless"), Some(false));
}

#[test]
fn test_origin_with_alpha_falls_back_to_png() {
    let codec = MockCodec::new(&[(10, 10)])
        .with_loaders(Some("jpegload_source"), None)
        .with_alpha(true);
    let (result, _, sink) = run_mock(&codec, "", &default_config());

    assert_eq!(result.unwrap().output, Output::Png);
    assert_eq!(sink.extension(), Some(".png"));
}

#[test]
fn test_disabled_saver_writes_nothing() {
    let codec = MockCodec::new(&[(10, 10)]);
    let config = ProcessingConfig {
        savers: Savers::all().without(Output::Avif),
        ..default_config()
    };
    let (result, _, sink) = run_mock(&codec, "output=avif", &config);

    let err = result.unwrap_err();
    assert!(matches!(err, StreamError::UnsupportedSaver { .. }));
    assert_eq!(
        err.to_string(),
        "Saving to avif is disabled. Supported savers: jpg, png, webp, tiff, gif, json"
    );
    assert!(codec.saves().is_empty());
    assert!(sink.extension().is_none());
}

#[test]
fn test_json_skips_encoder() {
    let codec = MockCodec::new(&[(30, 20); 3]);
    let (result, _, sink) = run_mock(&codec, "n=2&output=json", &default_config());

    assert_eq!(result.unwrap().mime_type, "application/json");
    assert!(codec.saves().is_empty());
    assert!(sink.is_finished());

    let json: serde_json::Value = serde_json::from_slice(sink.data()).unwrap();
    assert_eq!(json["format"], "gif");
    assert_eq!(json["width"], 30);
    assert_eq!(json["height"], 40);
    assert_eq!(json["pages"], 3);
    assert_eq!(json["page_height"], 20);
}

// =============================================================================
// Raster Engine End to End
// =============================================================================

#[test]
fn test_raster_png_resize_to_webp() {
    let (result, _, sink) = run_raster(
        create_png(64, 32, true),
        "w=16&output=webp",
        &default_config(),
    );

    assert_eq!(result.unwrap().mime_type, "image/webp");
    let decoded = image::load_from_memory(sink.data()).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (16, 8));
}

#[test]
fn test_raster_jpeg_rotation() {
    let (result, _, sink) = run_raster(create_jpeg(40, 20), "ro=90", &default_config());

    assert_eq!(result.unwrap().output, Output::Jpeg);
    let decoded = image::load_from_memory(sink.data()).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (20, 40));
}

#[test]
fn test_raster_gif_all_frames() {
    let (result, query, sink) = run_raster(
        create_gif(8, 6, 3, 50),
        "n=-1&output=json",
        &default_config(),
    );

    result.unwrap();
    assert_eq!(query.get("n", 0), 3);

    let json: serde_json::Value = serde_json::from_slice(sink.data()).unwrap();
    assert_eq!(json["pages"], 3);
    assert_eq!(json["height"], 18);
    assert_eq!(json["page_height"], 6);
    assert_eq!(json["delay"], serde_json::json!([50, 50, 50]));
}

#[test]
fn test_raster_gif_reencode_keeps_frames() {
    let (result, _, sink) = run_raster(
        create_gif(8, 6, 3, 50),
        "n=-1&output=gif&delay=80",
        &default_config(),
    );

    assert_eq!(result.unwrap().output, Output::Gif);

    let decoder = image::codecs::gif::GifDecoder::new(std::io::Cursor::new(sink.data())).unwrap();
    let frames = decoder.into_frames().collect_frames().unwrap();
    assert_eq!(frames.len(), 3);
    let (numer, denom) = frames[0].delay().numer_denom_ms();
    assert_eq!(numer / denom, 80);
}

#[test]
fn test_raster_tiff_largest_page() {
    let data = create_tiff(&[(4, 4), (16, 8), (2, 2)]);
    let (result, query, sink) = run_raster(data, "page=-1&output=png", &default_config());

    result.unwrap();
    assert_eq!(query.get("page", -9), 1);
    let decoded = image::load_from_memory(sink.data()).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (16, 8));
}
