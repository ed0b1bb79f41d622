//! Container format detection by magic bytes.
//!
//! Supported containers:
//!
//! - **JPEG**: `FF D8 FF`
//! - **PNG**: the 8-byte PNG signature
//! - **GIF**: `GIF87a` / `GIF89a`
//! - **WebP**: `RIFF....WEBP`
//! - **TIFF**: classic (version 42) and BigTIFF (version 43), either byte order
//!
//! Anything else is left to the buffer sniff of the engine.

use image::ImageFormat;

/// Bytes needed to identify every supported container.
pub const SNIFF_BYTES: usize = 16;

/// Classic TIFF header size.
const TIFF_HEADER_SIZE: usize = 8;

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Application extension identifiers carrying a loop count.
const LOOP_EXTENSIONS: [&[u8]; 2] = [b"NETSCAPE2.0", b"ANIMEXTS1.0"];

/// `VP8X` feature flags.
const WEBP_ANIMATION_FLAG: u8 = 0x02;
const WEBP_ALPHA_FLAG: u8 = 0x10;

/// RIFF header: `RIFF`, file size, `WEBP`.
const RIFF_HEADER_SIZE: usize = 12;
const CHUNK_HEADER_SIZE: usize = 8;

// =============================================================================
// SniffedFormat
// =============================================================================

/// Container identified from the leading bytes of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SniffedFormat {
    Jpeg,
    Png,
    Gif,
    Webp,
    Tiff,
}

impl SniffedFormat {
    /// Loader name prefix, e.g. `"jpegload"`.
    pub const fn loader_prefix(self) -> &'static str {
        match self {
            SniffedFormat::Jpeg => "jpegload",
            SniffedFormat::Png => "pngload",
            SniffedFormat::Gif => "gifload",
            SniffedFormat::Webp => "webpload",
            SniffedFormat::Tiff => "tiffload",
        }
    }

    pub const fn image_format(self) -> ImageFormat {
        match self {
            SniffedFormat::Jpeg => ImageFormat::Jpeg,
            SniffedFormat::Png => ImageFormat::Png,
            SniffedFormat::Gif => ImageFormat::Gif,
            SniffedFormat::Webp => ImageFormat::WebP,
            SniffedFormat::Tiff => ImageFormat::Tiff,
        }
    }

    /// Reverse of [`loader_prefix`](Self::loader_prefix).
    pub fn from_loader(loader: &str) -> Option<Self> {
        [
            SniffedFormat::Jpeg,
            SniffedFormat::Png,
            SniffedFormat::Gif,
            SniffedFormat::Webp,
            SniffedFormat::Tiff,
        ]
        .into_iter()
        .find(|f| loader.starts_with(f.loader_prefix()))
    }
}

// =============================================================================
// Format Detection
// =============================================================================

/// Detect the container from the leading bytes.
pub fn detect_format(header: &[u8]) -> Option<SniffedFormat> {
    if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(SniffedFormat::Jpeg)
    } else if header.starts_with(&PNG_SIGNATURE) {
        Some(SniffedFormat::Png)
    } else if header.starts_with(b"GIF87a") || header.starts_with(b"GIF89a") {
        Some(SniffedFormat::Gif)
    } else if header.len() >= 12 && &header[0..4] == b"RIFF" && &header[8..12] == b"WEBP" {
        Some(SniffedFormat::Webp)
    } else if is_tiff_header(header) {
        Some(SniffedFormat::Tiff)
    } else {
        None
    }
}

/// Check if bytes represent a valid TIFF or BigTIFF header.
pub fn is_tiff_header(bytes: &[u8]) -> bool {
    if bytes.len() < TIFF_HEADER_SIZE {
        return false;
    }

    let version = match &bytes[0..2] {
        b"II" => u16::from_le_bytes([bytes[2], bytes[3]]),
        b"MM" => u16::from_be_bytes([bytes[2], bytes[3]]),
        _ => return false,
    };

    version == 42 || version == 43
}

/// Loop count declared by a GIF application extension, if any.
///
/// Scans for the `NETSCAPE2.0` (or `ANIMEXTS1.0`) block and reads its
/// little-endian loop field. 0 means loop forever.
pub fn gif_loop_count(data: &[u8]) -> Option<i32> {
    LOOP_EXTENSIONS.iter().find_map(|marker| {
        let start = data
            .windows(marker.len())
            .position(|window| window == *marker)?;
        let block = data.get(start + marker.len()..start + marker.len() + 4)?;
        // Sub-block of 3 bytes, id 1, then the u16 loop count.
        (block[0] == 0x03 && block[1] == 0x01)
            .then(|| i32::from(u16::from_le_bytes([block[2], block[3]])))
    })
}

// =============================================================================
// WebP Animation
// =============================================================================

/// Canvas and frame headers of an animated WebP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebpAnimation {
    pub width: u32,
    pub height: u32,
    pub has_alpha: bool,
    /// 0 means loop forever
    pub loop_count: i32,
    /// Frame durations in milliseconds
    pub delays: Vec<i32>,
}

fn read_u24(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0])
}

/// Walk the RIFF chunks of an animated WebP.
///
/// Returns `None` for still WebP images and anything else. Frames are
/// counted from their `ANMF` headers; the walk stops at the first truncated
/// chunk.
pub fn webp_animation(data: &[u8]) -> Option<WebpAnimation> {
    if detect_format(data) != Some(SniffedFormat::Webp) {
        return None;
    }

    let mut animation: Option<WebpAnimation> = None;
    let mut offset = RIFF_HEADER_SIZE;

    while let Some(header) = data.get(offset..offset + CHUNK_HEADER_SIZE) {
        let size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        let start = offset + CHUNK_HEADER_SIZE;
        let Some(payload) = data.get(start..start.saturating_add(size)) else {
            break;
        };

        match &header[0..4] {
            b"VP8X" if payload.len() >= 10 => {
                if payload[0] & WEBP_ANIMATION_FLAG == 0 {
                    return None;
                }
                animation = Some(WebpAnimation {
                    width: read_u24(&payload[4..7]) + 1,
                    height: read_u24(&payload[7..10]) + 1,
                    has_alpha: payload[0] & WEBP_ALPHA_FLAG != 0,
                    loop_count: 0,
                    delays: Vec::new(),
                });
            }
            b"ANIM" if payload.len() >= 6 => {
                if let Some(animation) = animation.as_mut() {
                    animation.loop_count = i32::from(u16::from_le_bytes([payload[4], payload[5]]));
                }
            }
            b"ANMF" if payload.len() >= 16 => {
                if let Some(animation) = animation.as_mut() {
                    animation.delays.push(read_u24(&payload[12..15]) as i32);
                }
            }
            _ => {}
        }

        // Chunks are padded to an even size
        offset = start.saturating_add(size + (size & 1));
    }

    animation
}

// =============================================================================
// Tests
// =============================================================================
