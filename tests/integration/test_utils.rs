//! Test utilities for integration tests.
//!
//! This module provides a recording mock codec and helper functions for
//! creating test images in various formats.

use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, DynamicImage, Frame, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

use image_stream::codec::{
    CodecOptions, ImageCodec, ImageHandle, LoadInput, Loader, TimeoutGuard, Transform,
};
use image_stream::error::{CodecError, IoError};
use image_stream::io::{Sink, Source};

// =============================================================================
// Mock Codec with Call Tracking
// =============================================================================

/// Image handle produced by [`MockCodec`].
#[derive(Debug, Clone, PartialEq)]
pub struct MockImage {
    pub width: u32,
    pub page_height: u32,
    pub n_loaded: u32,
    pub n_pages: u32,
    pub orientation: u16,
    pub has_alpha: bool,
}

impl ImageHandle for MockImage {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u64 {
        u64::from(self.page_height) * u64::from(self.n_loaded)
    }

    fn page_height(&self) -> u32 {
        self.page_height
    }

    fn n_pages(&self) -> u32 {
        self.n_pages
    }

    fn orientation(&self) -> u16 {
        self.orientation
    }

    fn has_alpha(&self) -> bool {
        self.has_alpha
    }

    fn loop_count(&self) -> Option<i32> {
        None
    }

    fn delays(&self) -> Option<Vec<i32>> {
        None
    }
}

/// A codec that ignores the source bytes and serves images with
/// configurable page sizes, recording every call.
#[derive(Clone)]
pub struct MockCodec {
    pages: Vec<(u32, u32)>,
    orientation: u16,
    has_alpha: bool,
    source_loader: Option<String>,
    buffer_loader: Option<String>,
    load_delay: Duration,
    transform_delay: Duration,
    loads: Arc<Mutex<Vec<CodecOptions>>>,
    transforms: Arc<Mutex<Vec<Transform>>>,
    saves: Arc<Mutex<Vec<(String, CodecOptions)>>>,
}

impl MockCodec {
    /// A GIF-like source with the given page sizes.
    pub fn new(pages: &[(u32, u32)]) -> Self {
        Self {
            pages: pages.to_vec(),
            orientation: 0,
            has_alpha: false,
            source_loader: Some("gifload_source".to_string()),
            buffer_loader: None,
            load_delay: Duration::ZERO,
            transform_delay: Duration::ZERO,
            loads: Arc::new(Mutex::new(Vec::new())),
            transforms: Arc::new(Mutex::new(Vec::new())),
            saves: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_orientation(mut self, orientation: u16) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_alpha(mut self, has_alpha: bool) -> Self {
        self.has_alpha = has_alpha;
        self
    }

    /// Loaders returned by the source and buffer sniffs.
    pub fn with_loaders(mut self, source: Option<&str>, buffer: Option<&str>) -> Self {
        self.source_loader = source.map(str::to_string);
        self.buffer_loader = buffer.map(str::to_string);
        self
    }

    /// Sleep in every `load` and `transform` call.
    pub fn with_delays(mut self, load: Duration, transform: Duration) -> Self {
        self.load_delay = load;
        self.transform_delay = transform;
        self
    }

    pub fn loads(&self) -> Vec<CodecOptions> {
        self.loads.lock().unwrap().clone()
    }

    pub fn transforms(&self) -> Vec<Transform> {
        self.transforms.lock().unwrap().clone()
    }

    pub fn saves(&self) -> Vec<(String, CodecOptions)> {
        self.saves.lock().unwrap().clone()
    }
}

impl ImageCodec for MockCodec {
    type Image = MockImage;

    fn find_loader(&self, source: &mut dyn Source) -> Result<Option<Loader>, IoError> {
        source.sniff(4)?;
        Ok(self.source_loader.as_deref().map(Loader::new))
    }

    fn find_loader_buffer(&self, _data: &[u8]) -> Option<Loader> {
        self.buffer_loader.as_deref().map(Loader::new)
    }

    fn load(
        &self,
        _input: LoadInput<'_>,
        _loader: &Loader,
        options: &CodecOptions,
    ) -> Result<MockImage, CodecError> {
        self.loads.lock().unwrap().push(options.clone());
        std::thread::sleep(self.load_delay);

        let page = options.get_int("page").unwrap_or(0);
        let n = options.get_int("n").unwrap_or(1);
        if page < 0 || n < 1 || (page + n) as usize > self.pages.len() {
            return Err(CodecError::decode(format!(
                "page window {}+{} out of range",
                page, n
            )));
        }

        let (width, page_height) = self.pages[page as usize];
        Ok(MockImage {
            width,
            page_height,
            n_loaded: n as u32,
            n_pages: self.pages.len() as u32,
            orientation: self.orientation,
            has_alpha: self.has_alpha,
        })
    }

    fn transform(
        &self,
        image: MockImage,
        transform: &Transform,
        guard: &TimeoutGuard,
    ) -> Result<MockImage, CodecError> {
        std::thread::sleep(self.transform_delay);
        guard.check()?;
        self.transforms.lock().unwrap().push(*transform);
        Ok(image)
    }

    fn save(
        &self,
        _image: &MockImage,
        extension: &str,
        options: &CodecOptions,
        sink: &mut dyn Sink,
        guard: &TimeoutGuard,
    ) -> Result<(), CodecError> {
        guard.check()?;
        self.saves
            .lock()
            .unwrap()
            .push((extension.to_string(), options.clone()));
        sink.write(format!("MOCK{}", extension).as_bytes())?;
        Ok(())
    }
}

// =============================================================================
// Image Fixtures
// =============================================================================

fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, format).unwrap();
    buffer.into_inner()
}

/// Solid-colour PNG, with a half-transparent alpha channel if `alpha`.
pub fn create_png(width: u32, height: u32, alpha: bool) -> Vec<u8> {
    let image = if alpha {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 128])))
    } else {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([10, 20, 30])))
    };
    encode(image, ImageFormat::Png)
}

pub fn create_jpeg(width: u32, height: u32) -> Vec<u8> {
    encode(
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 100, 50]))),
        ImageFormat::Jpeg,
    )
}

/// Animated GIF with `frames` opaque frames of the same size.
pub fn create_gif(width: u32, height: u32, frames: usize, delay_ms: u32) -> Vec<u8> {
    let mut buffer = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut buffer);
        encoder.set_repeat(Repeat::Infinite).unwrap();
        for _ in 0..frames {
            let frame = Frame::from_parts(
                RgbaImage::from_pixel(width, height, Rgba([0, 120, 0, 255])),
                0,
                0,
                Delay::from_numer_denom_ms(delay_ms, 1),
            );
            encoder.encode_frame(frame).unwrap();
        }
    }
    buffer
}

/// Multi-page RGB TIFF with one page per entry of `pages`.
pub fn create_tiff(pages: &[(u32, u32)]) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut encoder = tiff::encoder::TiffEncoder::new(&mut buffer).unwrap();
        for (w, h) in pages {
            let data = vec![90u8; (*w * *h * 3) as usize];
            encoder
                .write_image::<tiff::encoder::colortype::RGB8>(*w, *h, &data)
                .unwrap();
        }
    }
    buffer.into_inner()
}

/// Grayscale TIFF with `pages` pages of `width` x `height`.
///
/// Only the IFDs are real: every strip points at a single byte, so the
/// declared size can be far larger than the file.
pub fn create_tall_tiff(pages: u32, width: u32, height: u32) -> Vec<u8> {
    const ENTRIES: u32 = 9;
    const IFD_SIZE: u32 = 2 + ENTRIES * 12 + 4;
    let strip_offset = 8 + IFD_SIZE * pages;

    let mut data = b"II\x2A\x00".to_vec();
    data.extend_from_slice(&8u32.to_le_bytes());

    for index in 0..pages {
        let next = if index + 1 < pages {
            8 + IFD_SIZE * (index + 1)
        } else {
            0
        };
        // (tag, type, value) with type 3 = SHORT, 4 = LONG
        let entries: [(u16, u16, u32); ENTRIES as usize] = [
            (256, 4, width),
            (257, 4, height),
            (258, 3, 8),
            (259, 3, 1),
            (262, 3, 1),
            (273, 4, strip_offset),
            (277, 3, 1),
            (278, 4, height),
            (279, 4, width.saturating_mul(height)),
        ];
        data.extend_from_slice(&(ENTRIES as u16).to_le_bytes());
        for (tag, kind, value) in entries {
            data.extend_from_slice(&tag.to_le_bytes());
            data.extend_from_slice(&kind.to_le_bytes());
            data.extend_from_slice(&1u32.to_le_bytes());
            data.extend_from_slice(&value.to_le_bytes());
        }
        data.extend_from_slice(&next.to_le_bytes());
    }

    data.push(0);
    data
}

/// Bytes no loader recognises.
pub fn create_garbage() -> Vec<u8> {
    let mut buffer = Vec::new();
    buffer.write_all(b"this is not an image at all").unwrap();
    buffer
}
