//! Codec engine boundary.
//!
//! The pipeline never touches pixels itself. It identifies a loader for the
//! source, asks the engine to load the image with a flat set of options, hands
//! the resolved [`Transform`] back to the engine, and finally asks it to encode
//! into a sink. Everything behind [`ImageCodec`] is engine-specific.
//!
//! [`RasterCodec`] is the engine shipped with the crate, built on the `image`
//! crate.

mod detect;
mod options;
mod raster;
mod timeout;

pub use detect::{
    detect_format, gif_loop_count, is_tiff_header, webp_animation, SniffedFormat, WebpAnimation,
    SNIFF_BYTES,
};
pub use options::{Access, CodecOptions, OptionValue};
pub use raster::{RasterCodec, RasterImage};
pub use timeout::TimeoutGuard;

use crate::error::{CodecError, IoError};
use crate::io::{Blob, Sink, Source};
use crate::query::ImageType;

// =============================================================================
// Loader
// =============================================================================

/// Name of the loader selected for a source, e.g. `"jpegload_source"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loader(String);

impl Loader {
    pub fn new(name: impl Into<String>) -> Self {
        Loader(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Source format implied by the loader name.
    pub fn image_type(&self) -> ImageType {
        ImageType::from_loader(&self.0)
    }
}

/// Where a load reads its bytes from.
///
/// A source is used when the engine recognised the container directly. A
/// blob is used when only the buffer sniff matched; it shares the source
/// bytes so that repeated loads do not re-read the source.
pub enum LoadInput<'a> {
    Source(&'a mut dyn Source),
    Blob(&'a Blob),
}

// =============================================================================
// Transform
// =============================================================================

/// Resolved geometry the engine applies after decoding.
///
/// `width`/`height` of 0 mean "auto" along that axis. Resizing happens
/// before rotation, so for orientations that swap axes the target box is
/// already transposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Transform {
    pub width: u32,
    pub height: u32,
    /// Clockwise rotation in degrees, one of 0, 90, 180, 270
    pub angle: u32,
    /// Mirror vertically
    pub flip: bool,
    /// Mirror horizontally
    pub flop: bool,
}

impl Transform {
    pub fn is_identity(&self) -> bool {
        *self == Transform::default()
    }
}

// =============================================================================
// Traits
// =============================================================================

/// Metadata of a loaded image.
///
/// Multi-page images are a vertical stack of equally sized pages:
/// `height() == page_height() * loaded pages`. The stacked height can exceed
/// `u32::MAX` for tall page windows.
pub trait ImageHandle: Send {
    fn width(&self) -> u32;

    fn height(&self) -> u64;

    fn page_height(&self) -> u32;

    /// Total number of pages in the source, not only the loaded window.
    fn n_pages(&self) -> u32;

    /// EXIF orientation tag, 0 when absent.
    fn orientation(&self) -> u16;

    fn has_alpha(&self) -> bool;

    /// Animation loop count, if the source declares one (0 = forever).
    fn loop_count(&self) -> Option<i32>;

    /// Per-frame delays in milliseconds, if the source is animated.
    fn delays(&self) -> Option<Vec<i32>>;
}

/// An image codec engine.
pub trait ImageCodec: Send + Sync {
    type Image: ImageHandle;

    /// Identify the loader by sniffing the source container.
    fn find_loader(&self, source: &mut dyn Source) -> Result<Option<Loader>, IoError>;

    /// Identify the loader from an in-memory buffer.
    ///
    /// Fallback when [`find_loader`](Self::find_loader) found nothing.
    fn find_loader_buffer(&self, data: &[u8]) -> Option<Loader>;

    /// Load an image.
    ///
    /// Recognised options: `access`, `fail`, `page`, `n`. Loads are called
    /// once per measured page, so engines should read headers here and defer
    /// pixel decoding to `transform`/`save`.
    fn load(
        &self,
        input: LoadInput<'_>,
        loader: &Loader,
        options: &CodecOptions,
    ) -> Result<Self::Image, CodecError>;

    /// Apply resize, rotation and mirroring.
    fn transform(
        &self,
        image: Self::Image,
        transform: &Transform,
        guard: &TimeoutGuard,
    ) -> Result<Self::Image, CodecError>;

    /// Encode `image` to the format named by `extension` (e.g. `".png"`) and
    /// write it to `sink`. The sink is already set up; the caller ends it.
    fn save(
        &self,
        image: &Self::Image,
        extension: &str,
        options: &CodecOptions,
        sink: &mut dyn Sink,
        guard: &TimeoutGuard,
    ) -> Result<(), CodecError>;
}
