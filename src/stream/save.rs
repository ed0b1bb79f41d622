//! Output format resolution and encoder options.
//!
//! Each format has a pure builder `(query, config) -> CodecOptions`. Every
//! request value is a validated read that falls back to the configured
//! default, so out-of-range input never fails a request.

use serde::Serialize;

use crate::codec::{CodecOptions, ImageHandle};
use crate::config::ProcessingConfig;
use crate::error::StreamError;
use crate::query::{ImageType, Output, QueryStore, Savers};

// =============================================================================
// Output Resolution
// =============================================================================

/// The output format for a request.
///
/// `Origin` reuses the source format, except that a source with alpha whose
/// format cannot carry alpha is written as PNG.
pub fn resolve_output(query: &QueryStore, image_type: ImageType, has_alpha: bool) -> Output {
    match query.get("output", Output::Origin) {
        Output::Origin if image_type.supports_alpha() || !has_alpha => image_type.to_output(),
        Output::Origin => Output::Png,
        output => output,
    }
}

/// Fail with `UnsupportedSaver` when `output` is disabled.
pub fn check_saver(output: Output, savers: Savers) -> Result<(), StreamError> {
    if savers.contains(output) {
        return Ok(());
    }
    Err(StreamError::UnsupportedSaver {
        message: format!(
            "Saving to {} is disabled. Supported savers: {}",
            output.extension().trim_start_matches('.'),
            savers.names()
        ),
    })
}

// =============================================================================
// Per-format Options
// =============================================================================

fn quality(query: &QueryStore, default: u8) -> i32 {
    query.get_if("q", |q: &i32| (1..=100).contains(q), i32::from(default))
}

pub fn jpeg_options(query: &QueryStore, config: &ProcessingConfig) -> CodecOptions {
    CodecOptions::new()
        .set("Q", quality(query, config.jpeg_quality))
        .set("interlace", query.get("il", false))
        .set("optimize_coding", true)
}

pub fn png_options(query: &QueryStore, config: &ProcessingConfig) -> CodecOptions {
    let level = query.get_if(
        "l",
        |l: &i32| (0..=9).contains(l),
        i32::from(config.zlib_level),
    );
    let filter = if query.get("af", false) { "all" } else { "none" };

    CodecOptions::new()
        .set("interlace", query.get("il", false))
        .set("compression", level)
        .set("filter", filter)
}

pub fn webp_options(query: &QueryStore, config: &ProcessingConfig) -> CodecOptions {
    CodecOptions::new()
        .set("lossless", query.get("ll", false))
        .set("Q", quality(query, config.webp_quality))
        .set("effort", i32::from(config.webp_effort))
}

pub fn avif_options(query: &QueryStore, config: &ProcessingConfig) -> CodecOptions {
    CodecOptions::new()
        .set("Q", quality(query, config.avif_quality))
        .set("compression", "av1")
        .set("effort", i32::from(config.avif_effort))
}

pub fn tiff_options(query: &QueryStore, config: &ProcessingConfig) -> CodecOptions {
    CodecOptions::new()
        .set("Q", quality(query, config.tiff_quality))
        .set("compression", "jpeg")
}

pub fn gif_options(_query: &QueryStore, config: &ProcessingConfig) -> CodecOptions {
    CodecOptions::new().set("effort", i32::from(config.gif_effort))
}

/// Encoder options for `output`; PNG for `Origin` and `Json`.
pub fn save_options(output: Output, query: &QueryStore, config: &ProcessingConfig) -> CodecOptions {
    match output {
        Output::Jpeg => jpeg_options(query, config),
        Output::Webp => webp_options(query, config),
        Output::Avif => avif_options(query, config),
        Output::Tiff => tiff_options(query, config),
        Output::Gif => gif_options(query, config),
        Output::Png | Output::Origin | Output::Json => png_options(query, config),
    }
}

/// Page height, loop count and frame delays for multi-frame output.
///
/// Reads the resolved `n` and `page_height`. A single delay is repeated for
/// every frame; a list is passed through as given.
pub fn frame_options(query: &QueryStore) -> CodecOptions {
    let n = query.get("n", 1);
    let mut options = CodecOptions::new();

    // A page height on a single page would turn it into an animation
    if n > 1 {
        options.insert("page_height", query.get("page_height", 0));
    }

    let loop_count = query.get("loop", -1);
    if loop_count >= 0 {
        options.insert("loop", loop_count);
    }

    let delays = query.get_if(
        "delay",
        |delays: &Vec<i32>| delays.iter().all(|d| *d >= 0),
        Vec::new(),
    );
    match delays.as_slice() {
        [] => {}
        [delay] => options.insert("delay", vec![*delay; n.max(1) as usize]),
        _ => options.insert("delay", delays),
    }

    options
}

// =============================================================================
// Output Descriptor
// =============================================================================

/// Everything the encode step needs.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputDescriptor {
    pub output: Output,
    pub extension: &'static str,
    pub options: CodecOptions,
}

impl OutputDescriptor {
    pub fn is_json(&self) -> bool {
        self.output == Output::Json
    }
}

/// Resolve the output format, check it is enabled, and build its options.
pub fn build_output(
    query: &QueryStore,
    config: &ProcessingConfig,
    image_type: ImageType,
    has_alpha: bool,
) -> Result<OutputDescriptor, StreamError> {
    let output = resolve_output(query, image_type, has_alpha);
    check_saver(output, config.savers)?;

    let options = if output == Output::Json {
        CodecOptions::new()
    } else {
        // Strip EXIF, XMP and IPTC
        let mut options = CodecOptions::new().set("strip", true);
        options.extend(save_options(output, query, config));
        options.extend(frame_options(query));
        options
    };

    Ok(OutputDescriptor {
        output,
        extension: output.extension(),
        options,
    })
}

// =============================================================================
// JSON Output
// =============================================================================

/// Image metadata written for `output=json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageMetadata {
    pub format: &'static str,
    pub width: u32,
    pub height: u64,
    pub pages: u32,
    pub page_height: u32,
    pub has_alpha: bool,
    pub orientation: u16,
    #[serde(rename = "loop", skip_serializing_if = "Option::is_none")]
    pub loop_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<Vec<i32>>,
}

impl ImageMetadata {
    pub fn from_image<I: ImageHandle>(image: &I, image_type: ImageType) -> Self {
        Self {
            format: image_type.name(),
            width: image.width(),
            height: image.height(),
            pages: image.n_pages(),
            page_height: image.page_height(),
            has_alpha: image.has_alpha(),
            orientation: image.orientation(),
            loop_count: image.loop_count(),
            delay: image.delays(),
        }
    }
}

/// Serialize image metadata as JSON.
pub fn image_to_json<I: ImageHandle>(
    image: &I,
    image_type: ImageType,
) -> Result<Vec<u8>, StreamError> {
    serde_json::to_vec(&ImageMetadata::from_image(image, image_type)).map_err(|e| {
        StreamError::Encode {
            message: e.to_string(),
        }
    })
}
