//! Codec engine built on the `image` crate.
//!
//! # Loading
//!
//! Loads are lazy: `load` only parses headers (dimensions, page count,
//! alpha, EXIF orientation, frame delays) and pixels are decoded on the
//! first `transform` or `save`. Animated GIF frames are counted from their
//! frame descriptors with the `gif` crate and animated WebP frames from the
//! RIFF chunk headers. Animation frames are composited in order, so a decode
//! stops after the last frame of the loaded window.
//!
//! TIFF pages are addressed through the `tiff` crate directly because the
//! `image` TIFF decoder only exposes the first page.
//!
//! # Multi-page images
//!
//! Loaded pages are kept as separate frames. Encoders without frame support
//! receive the frames stacked vertically into one page strip.

use std::borrow::Cow;
use std::io::Cursor;

use image::codecs::avif::AvifEncoder;
use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::{WebPDecoder, WebPEncoder};
use image::imageops::FilterType;
use image::{
    AnimationDecoder, Delay, DynamicImage, Frame, GenericImageView, ImageBuffer,
    ImageDecoder, ImageError, ImageFormat, ImageReader, Luma, LumaA, Rgb, RgbImage, Rgba,
    RgbaImage,
};
use tiff::decoder::{Decoder as TiffDecoder, DecodingResult};
use tiff::ColorType as TiffColor;
use tracing::{debug, warn};

use crate::error::{CodecError, IoError};
use crate::io::{Blob, Sink, Source};
use crate::query::Output;

use super::detect::{
    detect_format, gif_loop_count, webp_animation, SniffedFormat, WebpAnimation, SNIFF_BYTES,
};
use super::{
    CodecOptions, ImageCodec, ImageHandle, LoadInput, Loader, TimeoutGuard, Transform,
};

/// Loader used when only `image::guess_format` recognised the buffer.
const GENERIC_LOADER: &str = "imageload_buffer";

fn decode_error(err: ImageError) -> CodecError {
    CodecError::decode(err.to_string())
}

fn encode_error(err: ImageError) -> CodecError {
    CodecError::encode(err.to_string())
}

fn tiff_error(err: tiff::TiffError) -> CodecError {
    CodecError::decode(err.to_string())
}

fn gif_error(err: gif::DecodingError) -> CodecError {
    CodecError::decode(err.to_string())
}

fn frame_delay_ms(delay: Delay) -> i32 {
    let (numer, denom) = delay.numer_denom_ms();
    i32::try_from(numer.checked_div(denom).unwrap_or(0)).unwrap_or(i32::MAX)
}

// =============================================================================
// RasterImage
// =============================================================================

#[derive(Debug, Clone)]
struct RasterFrame {
    image: DynamicImage,
    delay_ms: i32,
}

impl RasterFrame {
    fn still(image: DynamicImage) -> Self {
        Self { image, delay_ms: 0 }
    }
}

/// Pixels not decoded yet.
#[derive(Debug, Clone)]
struct PendingDecode {
    data: Blob,
    format: ImageFormat,
    animated: bool,
    page: usize,
    n: usize,
}

#[derive(Debug, Clone)]
enum Pixels {
    Pending(PendingDecode),
    Decoded(Vec<RasterFrame>),
}

/// Image loaded by [`RasterCodec`].
#[derive(Debug, Clone)]
pub struct RasterImage {
    width: u32,
    page_height: u32,
    n_loaded: u32,
    n_pages: u32,
    orientation: u16,
    has_alpha: bool,
    loop_count: Option<i32>,
    delays: Option<Vec<i32>>,
    pixels: Pixels,
}

impl RasterImage {
    /// Number of pages in the loaded window.
    pub fn loaded_pages(&self) -> u32 {
        self.n_loaded
    }

    /// Whether the pixels have been decoded.
    pub fn is_decoded(&self) -> bool {
        matches!(self.pixels, Pixels::Decoded(_))
    }

    fn frames(&self, guard: &TimeoutGuard) -> Result<Cow<'_, [RasterFrame]>, CodecError> {
        match &self.pixels {
            Pixels::Decoded(frames) => Ok(Cow::Borrowed(frames.as_slice())),
            Pixels::Pending(pending) => pending.decode(guard).map(Cow::Owned),
        }
    }
}

impl ImageHandle for RasterImage {
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
        self.loop_count
    }

    fn delays(&self) -> Option<Vec<i32>> {
        self.delays.clone()
    }
}

// =============================================================================
// RasterCodec
// =============================================================================

/// [`ImageCodec`] implementation over `image`, `tiff` and `kamadak-exif`.
///
/// Stateless; one instance is shared by all requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterCodec;

impl RasterCodec {
    pub fn new() -> Self {
        RasterCodec
    }
}

impl ImageCodec for RasterCodec {
    type Image = RasterImage;

    fn find_loader(&self, source: &mut dyn Source) -> Result<Option<Loader>, IoError> {
        let header = source.sniff(SNIFF_BYTES)?;
        Ok(detect_format(&header).map(|f| Loader::new(format!("{}_source", f.loader_prefix()))))
    }

    fn find_loader_buffer(&self, data: &[u8]) -> Option<Loader> {
        if let Some(format) = detect_format(data) {
            return Some(Loader::new(format!("{}_buffer", format.loader_prefix())));
        }
        image::guess_format(data)
            .ok()
            .filter(|format| format.reading_enabled())
            .map(|_| Loader::new(GENERIC_LOADER))
    }

    fn load(
        &self,
        input: LoadInput<'_>,
        loader: &Loader,
        options: &CodecOptions,
    ) -> Result<RasterImage, CodecError> {
        let data = match input {
            LoadInput::Source(source) => source.map_blob()?,
            LoadInput::Blob(blob) => blob.clone(),
        };

        let page = options.get_int("page").unwrap_or(0);
        let n = options.get_int("n").unwrap_or(1);
        if page < 0 || n < 1 {
            return Err(CodecError::decode(format!(
                "Invalid page window: page={}, n={}",
                page, n
            )));
        }
        let (page, n) = (page as usize, n as usize);
        let fail = options.get_bool("fail").unwrap_or(false);

        let format = resolve_format(loader, data.as_slice())?;

        let mut image = match format {
            ImageFormat::Tiff => load_tiff(data.clone(), page, n)?,
            ImageFormat::Gif => {
                let frames = scan_gif(data.as_slice(), fail)?;
                load_animation(data.clone(), format, frames, page, n)?
            }
            ImageFormat::WebP => match webp_animation(data.as_slice()) {
                Some(animation) => {
                    load_animation(data.clone(), format, animation.into(), page, n)?
                }
                None => load_still(data.clone(), format, page, n)?,
            },
            _ => load_still(data.clone(), format, page, n)?,
        };
        image.orientation = read_exif_orientation(data.as_slice());

        debug!(
            loader = loader.name(),
            width = image.width,
            page_height = image.page_height,
            n_pages = image.n_pages,
            page,
            n,
            "Loaded image"
        );

        Ok(image)
    }

    fn transform(
        &self,
        image: RasterImage,
        transform: &Transform,
        guard: &TimeoutGuard,
    ) -> Result<RasterImage, CodecError> {
        if transform.is_identity() {
            return Ok(image);
        }
        guard.check()?;

        let frames = image.frames(guard)?.into_owned();
        let mut transformed = Vec::with_capacity(frames.len());
        for frame in frames {
            guard.check()?;
            transformed.push(RasterFrame {
                image: apply_transform(frame.image, transform),
                delay_ms: frame.delay_ms,
            });
        }

        let (width, page_height) = transformed
            .first()
            .map(|f| f.image.dimensions())
            .unwrap_or((image.width, image.page_height));

        Ok(RasterImage {
            width,
            page_height,
            pixels: Pixels::Decoded(transformed),
            ..image
        })
    }

    fn save(
        &self,
        image: &RasterImage,
        extension: &str,
        options: &CodecOptions,
        sink: &mut dyn Sink,
        guard: &TimeoutGuard,
    ) -> Result<(), CodecError> {
        let output = Output::from_extension(extension)
            .filter(|o| *o != Output::Json)
            .ok_or_else(|| CodecError::Unsupported(format!("No saver for {}", extension)))?;

        guard.check()?;
        let frames = image.frames(guard)?;

        let buffer = if output == Output::Gif {
            encode_gif(&frames, image.loop_count, options, guard)?
        } else {
            let still = stack_frames(&frames)?;
            guard.check()?;
            encode_still(&still, output, options)?
        };

        guard.check()?;
        sink.write(&buffer)?;
        Ok(())
    }
}

fn resolve_format(loader: &Loader, data: &[u8]) -> Result<ImageFormat, CodecError> {
    if let Some(format) = SniffedFormat::from_loader(loader.name()) {
        return Ok(format.image_format());
    }
    if loader.name() == GENERIC_LOADER {
        return image::guess_format(data).map_err(decode_error);
    }
    Err(CodecError::Unsupported(format!(
        "Unknown loader: {}",
        loader.name()
    )))
}

fn check_window(page: usize, n: usize, n_pages: usize) -> Result<(), CodecError> {
    if page + n > n_pages {
        return Err(CodecError::decode(format!(
            "Pages {}..{} out of range, image has {} page(s)",
            page,
            page + n,
            n_pages
        )));
    }
    Ok(())
}

/// EXIF orientation tag, 0 when the container carries none.
fn read_exif_orientation(data: &[u8]) -> u16 {
    let mut cursor = Cursor::new(data);
    exif::Reader::new()
        .read_from_container(&mut cursor)
        .ok()
        .and_then(|exif| {
            exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
                .and_then(|f| f.value.get_uint(0))
        })
        .and_then(|v| u16::try_from(v).ok())
        .unwrap_or(0)
}

// =============================================================================
// Loaders
// =============================================================================

fn load_still(
    data: Blob,
    format: ImageFormat,
    page: usize,
    n: usize,
) -> Result<RasterImage, CodecError> {
    check_window(page, n, 1)?;

    let (width, height, has_alpha) = {
        let decoder = ImageReader::with_format(Cursor::new(data.as_slice()), format)
            .into_decoder()
            .map_err(decode_error)?;
        let (width, height) = decoder.dimensions();
        (width, height, decoder.color_type().has_alpha())
    };

    Ok(RasterImage {
        width,
        page_height: height,
        n_loaded: 1,
        n_pages: 1,
        orientation: 0,
        has_alpha,
        loop_count: None,
        delays: None,
        pixels: Pixels::Pending(PendingDecode {
            data,
            format,
            animated: false,
            page: 0,
            n: 1,
        }),
    })
}

/// Frame headers of an animation.
#[derive(Debug, Clone, Default)]
struct AnimationFrames {
    width: u32,
    page_height: u32,
    loop_count: Option<i32>,
    delays: Vec<i32>,
    transparent: Vec<bool>,
}

impl From<WebpAnimation> for AnimationFrames {
    fn from(animation: WebpAnimation) -> Self {
        Self {
            width: animation.width,
            page_height: animation.height,
            loop_count: Some(animation.loop_count),
            transparent: vec![animation.has_alpha; animation.delays.len()],
            delays: animation.delays,
        }
    }
}

/// Read the GIF frame descriptors without decompressing into pixels.
fn scan_gif(data: &[u8], fail: bool) -> Result<AnimationFrames, CodecError> {
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::Indexed);
    let mut decoder = options.read_info(Cursor::new(data)).map_err(gif_error)?;

    let mut frames = AnimationFrames {
        width: u32::from(decoder.width()),
        page_height: u32::from(decoder.height()),
        loop_count: gif_loop_count(data),
        ..Default::default()
    };

    loop {
        match decoder.next_frame_info() {
            Ok(Some(frame)) => {
                // Centiseconds
                frames.delays.push(i32::from(frame.delay) * 10);
                frames.transparent.push(frame.transparent.is_some());
            }
            Ok(None) => break,
            Err(err) if fail || frames.delays.is_empty() => return Err(gif_error(err)),
            Err(err) => {
                warn!(frames = frames.delays.len(), "Truncated animation: {}", err);
                break;
            }
        }
    }

    Ok(frames)
}

fn load_animation(
    data: Blob,
    format: ImageFormat,
    frames: AnimationFrames,
    page: usize,
    n: usize,
) -> Result<RasterImage, CodecError> {
    let n_pages = frames.delays.len();
    check_window(page, n, n_pages)?;

    let window = page..page + n;
    let has_alpha = frames.transparent[window.clone()].iter().any(|t| *t);
    let delays = frames.delays[window].to_vec();

    Ok(RasterImage {
        width: frames.width,
        page_height: frames.page_height,
        n_loaded: u32::try_from(n).unwrap_or(u32::MAX),
        n_pages: u32::try_from(n_pages).unwrap_or(u32::MAX),
        orientation: 0,
        has_alpha,
        loop_count: frames.loop_count,
        delays: Some(delays),
        pixels: Pixels::Pending(PendingDecode {
            data,
            format,
            animated: true,
            page,
            n,
        }),
    })
}

fn load_tiff(data: Blob, page: usize, n: usize) -> Result<RasterImage, CodecError> {
    let pages = {
        let mut decoder = TiffDecoder::new(Cursor::new(data.as_slice())).map_err(tiff_error)?;
        let mut pages = Vec::new();
        loop {
            let dimensions = decoder.dimensions().map_err(tiff_error)?;
            let color = decoder.colortype().map_err(tiff_error)?;
            pages.push((dimensions, color));
            if !decoder.more_images() {
                break;
            }
            decoder.next_image().map_err(tiff_error)?;
        }
        pages
    };

    check_window(page, n, pages.len())?;

    let window = &pages[page..page + n];
    let (width, page_height) = window[0].0;
    if window.iter().any(|(dimensions, _)| *dimensions != (width, page_height)) {
        return Err(CodecError::decode(format!(
            "Pages {}..{} differ in size",
            page,
            page + n
        )));
    }
    let has_alpha = window
        .iter()
        .any(|(_, color)| matches!(color, TiffColor::RGBA(_) | TiffColor::GrayA(_)));

    Ok(RasterImage {
        width,
        page_height,
        n_loaded: n as u32,
        n_pages: pages.len() as u32,
        orientation: 0,
        has_alpha,
        loop_count: None,
        delays: None,
        pixels: Pixels::Pending(PendingDecode {
            data,
            format: ImageFormat::Tiff,
            animated: false,
            page,
            n,
        }),
    })
}

impl PendingDecode {
    fn decode(&self, guard: &TimeoutGuard) -> Result<Vec<RasterFrame>, CodecError> {
        match self.format {
            ImageFormat::Tiff => self.decode_tiff(guard),
            _ if self.animated => self.decode_animation(guard),
            _ => {
                guard.check()?;
                let image =
                    ImageReader::with_format(Cursor::new(self.data.as_slice()), self.format)
                        .decode()
                        .map_err(decode_error)?;
                Ok(vec![RasterFrame::still(image)])
            }
        }
    }

    fn decode_animation(&self, guard: &TimeoutGuard) -> Result<Vec<RasterFrame>, CodecError> {
        let cursor = Cursor::new(self.data.as_slice());
        let frames = if self.format == ImageFormat::Gif {
            GifDecoder::new(cursor).map_err(decode_error)?.into_frames()
        } else {
            WebPDecoder::new(cursor).map_err(decode_error)?.into_frames()
        };

        let end = self.page + self.n;
        let mut window = Vec::with_capacity(self.n);
        for (index, frame) in frames.take(end).enumerate() {
            guard.check()?;
            let frame = frame.map_err(decode_error)?;
            if index < self.page {
                continue;
            }
            let delay_ms = frame_delay_ms(frame.delay());
            window.push(RasterFrame {
                image: DynamicImage::ImageRgba8(frame.into_buffer()),
                delay_ms,
            });
        }

        if window.len() < self.n {
            return Err(CodecError::decode(format!(
                "Animation ended before frame {}",
                end
            )));
        }
        Ok(window)
    }

    fn decode_tiff(&self, guard: &TimeoutGuard) -> Result<Vec<RasterFrame>, CodecError> {
        let mut decoder =
            TiffDecoder::new(Cursor::new(self.data.as_slice())).map_err(tiff_error)?;
        let mut frames = Vec::with_capacity(self.n);
        for index in self.page..self.page + self.n {
            guard.check()?;
            decoder.seek_to_image(index).map_err(tiff_error)?;
            let (width, height) = decoder.dimensions().map_err(tiff_error)?;
            let color = decoder.colortype().map_err(tiff_error)?;
            let pixels = decoder.read_image().map_err(tiff_error)?;
            frames.push(RasterFrame::still(tiff_to_image(width, height, color, pixels)?));
        }
        Ok(frames)
    }
}

fn tiff_to_image(
    width: u32,
    height: u32,
    color: TiffColor,
    pixels: DecodingResult,
) -> Result<DynamicImage, CodecError> {
    let image = match (color, pixels) {
        (TiffColor::Gray(8), DecodingResult::U8(buf)) => {
            ImageBuffer::<Luma<u8>, _>::from_raw(width, height, buf).map(DynamicImage::ImageLuma8)
        }
        (TiffColor::GrayA(8), DecodingResult::U8(buf)) => {
            ImageBuffer::<LumaA<u8>, _>::from_raw(width, height, buf)
                .map(DynamicImage::ImageLumaA8)
        }
        (TiffColor::RGB(8), DecodingResult::U8(buf)) => {
            RgbImage::from_raw(width, height, buf).map(DynamicImage::ImageRgb8)
        }
        (TiffColor::RGBA(8), DecodingResult::U8(buf)) => {
            RgbaImage::from_raw(width, height, buf).map(DynamicImage::ImageRgba8)
        }
        (TiffColor::Gray(16), DecodingResult::U16(buf)) => {
            ImageBuffer::<Luma<u16>, _>::from_raw(width, height, buf)
                .map(DynamicImage::ImageLuma16)
        }
        (TiffColor::GrayA(16), DecodingResult::U16(buf)) => {
            ImageBuffer::<LumaA<u16>, _>::from_raw(width, height, buf)
                .map(DynamicImage::ImageLumaA16)
        }
        (TiffColor::RGB(16), DecodingResult::U16(buf)) => {
            ImageBuffer::<Rgb<u16>, _>::from_raw(width, height, buf).map(DynamicImage::ImageRgb16)
        }
        (TiffColor::RGBA(16), DecodingResult::U16(buf)) => {
            ImageBuffer::<Rgba<u16>, _>::from_raw(width, height, buf)
                .map(DynamicImage::ImageRgba16)
        }
        _ => None,
    };

    image.ok_or_else(|| CodecError::Unsupported(format!("TIFF color type {:?}", color)))
}

// =============================================================================
// Transform
// =============================================================================

/// Target size for a `width` x `height` box where 0 means "auto".
fn target_size(src_width: u32, src_height: u32, width: u32, height: u32) -> Option<(u32, u32)> {
    let scale = |value: u32, num: u32, den: u32| -> u32 {
        let den = u64::from(den.max(1));
        let scaled = (u64::from(value) * u64::from(num) + den / 2) / den;
        u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
    };

    match (width, height) {
        (0, 0) => None,
        (w, 0) => Some((w, scale(src_height, w, src_width))),
        (0, h) => Some((scale(src_width, h, src_height), h)),
        (w, h) => Some((w, h)),
    }
}

fn apply_transform(image: DynamicImage, transform: &Transform) -> DynamicImage {
    let (src_width, src_height) = image.dimensions();

    let mut image = match target_size(src_width, src_height, transform.width, transform.height) {
        Some(size) if size == (src_width, src_height) => image,
        Some((w, h)) if transform.width == 0 || transform.height == 0 => {
            image.resize_exact(w, h, FilterType::Lanczos3)
        }
        Some((w, h)) => image.resize(w, h, FilterType::Lanczos3),
        None => image,
    };

    image = match transform.angle {
        90 => image.rotate90(),
        180 => image.rotate180(),
        270 => image.rotate270(),
        _ => image,
    };
    if transform.flip {
        image = image.flipv();
    }
    if transform.flop {
        image = image.fliph();
    }
    image
}

// =============================================================================
// Encoders
// =============================================================================

fn stack_frames(frames: &[RasterFrame]) -> Result<Cow<'_, DynamicImage>, CodecError> {
    match frames {
        [] => Err(CodecError::encode("Image has no frames")),
        [single] => Ok(Cow::Borrowed(&single.image)),
        [first, ..] => {
            let (width, page_height) = first.image.dimensions();
            let height = u32::try_from(frames.len())
                .ok()
                .and_then(|count| page_height.checked_mul(count))
                .ok_or_else(|| CodecError::encode("Stacked frames exceed the maximum height"))?;
            let mut strip = RgbaImage::new(width, height);
            for (index, frame) in frames.iter().enumerate() {
                let top = i64::from(page_height) * index as i64;
                image::imageops::replace(&mut strip, &frame.image.to_rgba8(), 0, top);
            }
            Ok(Cow::Owned(DynamicImage::ImageRgba8(strip)))
        }
    }
}

fn quality(options: &CodecOptions) -> u8 {
    options.get_int("Q").unwrap_or(80).clamp(1, 100) as u8
}

fn png_compression(level: i32) -> CompressionType {
    match level {
        i32::MIN..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

/// AVIF speed (1 slowest .. 10 fastest) from effort (0 fastest .. 9 slowest).
fn avif_speed(effort: i32) -> u8 {
    (10 - effort).clamp(1, 10) as u8
}

/// GIF quantizer speed (1 best .. 30 fastest) from effort (1 .. 10).
fn gif_speed(effort: i32) -> i32 {
    (31 - effort * 3).clamp(1, 30)
}

fn gif_repeat(loop_count: i32) -> Repeat {
    match loop_count {
        0 => Repeat::Infinite,
        count => Repeat::Finite(u16::try_from(count).unwrap_or(u16::MAX)),
    }
}

fn encode_still(
    image: &DynamicImage,
    output: Output,
    options: &CodecOptions,
) -> Result<Vec<u8>, CodecError> {
    let mut buffer = Vec::new();

    match output {
        Output::Jpeg => {
            let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, quality(options)))
                .map_err(encode_error)?;
        }
        Output::Png => {
            let compression = png_compression(options.get_int("compression").unwrap_or(6));
            let filter = match options.get_str("filter") {
                Some("all") => PngFilter::Adaptive,
                _ => PngFilter::NoFilter,
            };
            image
                .write_with_encoder(PngEncoder::new_with_quality(&mut buffer, compression, filter))
                .map_err(encode_error)?;
        }
        Output::Webp => {
            // Only the lossless encoder is available; `Q` does not apply.
            let rgba = DynamicImage::ImageRgba8(image.to_rgba8());
            rgba.write_with_encoder(WebPEncoder::new_lossless(&mut buffer))
                .map_err(encode_error)?;
        }
        Output::Avif => {
            let speed = avif_speed(options.get_int("effort").unwrap_or(4));
            let rgba = DynamicImage::ImageRgba8(image.to_rgba8());
            rgba.write_with_encoder(AvifEncoder::new_with_speed_quality(
                &mut buffer,
                speed,
                quality(options),
            ))
            .map_err(encode_error)?;
        }
        Output::Tiff => {
            let converted = if image.color().has_alpha() {
                DynamicImage::ImageRgba8(image.to_rgba8())
            } else {
                DynamicImage::ImageRgb8(image.to_rgb8())
            };
            converted
                .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Tiff)
                .map_err(encode_error)?;
        }
        Output::Gif | Output::Json | Output::Origin => {
            return Err(CodecError::Unsupported(format!(
                "{} is not a still-image format",
                output
            )));
        }
    }

    Ok(buffer)
}

fn encode_gif(
    frames: &[RasterFrame],
    source_loop: Option<i32>,
    options: &CodecOptions,
    guard: &TimeoutGuard,
) -> Result<Vec<u8>, CodecError> {
    let speed = gif_speed(options.get_int("effort").unwrap_or(7));
    let delays = options.get_ints("delay");

    let mut buffer = Vec::new();
    {
        let mut encoder = GifEncoder::new_with_speed(&mut buffer, speed);
        if let Some(count) = options.get_int("loop").or(source_loop) {
            encoder
                .set_repeat(gif_repeat(count))
                .map_err(encode_error)?;
        }

        for (index, frame) in frames.iter().enumerate() {
            guard.check()?;
            let delay_ms = delays
                .and_then(|d| d.get(index).copied())
                .unwrap_or(frame.delay_ms)
                .max(0) as u32;
            let gif_frame = Frame::from_parts(
                frame.image.to_rgba8(),
                0,
                0,
                Delay::from_numer_denom_ms(delay_ms, 1),
            );
            encoder.encode_frame(gif_frame).map_err(encode_error)?;
        }
        // Dropping the encoder writes the GIF trailer.
    }

    Ok(buffer)
}
