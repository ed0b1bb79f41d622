//! Output formats, detected source types and the enabled-savers bitmask.

use std::fmt;

// =============================================================================
// Output
// =============================================================================

/// Requested output format.
///
/// Each concrete format owns one bit so that a set of enabled savers can be
/// stored as a [`Savers`] bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Output {
    /// Reuse the source format (resolved before encoding)
    Origin,
    Jpeg,
    Png,
    Webp,
    Avif,
    Tiff,
    Gif,
    /// Image metadata as JSON instead of pixels
    Json,
}

impl Output {
    /// Every concrete (non-origin) format, in saver-list order.
    pub const SAVERS: [Output; 7] = [
        Output::Jpeg,
        Output::Png,
        Output::Webp,
        Output::Avif,
        Output::Tiff,
        Output::Gif,
        Output::Json,
    ];

    /// Bit of this format in a [`Savers`] mask. `Origin` has no bit.
    pub const fn bit(self) -> u32 {
        match self {
            Output::Origin => 0,
            Output::Jpeg => 1 << 0,
            Output::Png => 1 << 1,
            Output::Webp => 1 << 2,
            Output::Avif => 1 << 3,
            Output::Tiff => 1 << 4,
            Output::Gif => 1 << 5,
            Output::Json => 1 << 6,
        }
    }

    /// Short name used in query strings and saver lists.
    pub const fn name(self) -> &'static str {
        match self {
            Output::Origin => "origin",
            Output::Jpeg => "jpg",
            Output::Png => "png",
            Output::Webp => "webp",
            Output::Avif => "avif",
            Output::Tiff => "tiff",
            Output::Gif => "gif",
            Output::Json => "json",
        }
    }

    /// File extension handed to the sink, including the dot.
    pub const fn extension(self) -> &'static str {
        match self {
            Output::Origin | Output::Jpeg => ".jpg",
            Output::Png => ".png",
            Output::Webp => ".webp",
            Output::Avif => ".avif",
            Output::Tiff => ".tiff",
            Output::Gif => ".gif",
            Output::Json => ".json",
        }
    }

    pub const fn mime_type(self) -> &'static str {
        match self {
            Output::Origin | Output::Jpeg => "image/jpeg",
            Output::Png => "image/png",
            Output::Webp => "image/webp",
            Output::Avif => "image/avif",
            Output::Tiff => "image/tiff",
            Output::Gif => "image/gif",
            Output::Json => "application/json",
        }
    }

    /// Parse a query-string format name (`jpg`, `jpeg`, `png`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Output::Jpeg),
            "png" => Some(Output::Png),
            "webp" => Some(Output::Webp),
            "avif" => Some(Output::Avif),
            "tif" | "tiff" => Some(Output::Tiff),
            "gif" => Some(Output::Gif),
            "json" => Some(Output::Json),
            "origin" => Some(Output::Origin),
            _ => None,
        }
    }

    /// Map a sink extension (with or without the dot) back to a format.
    pub fn from_extension(extension: &str) -> Option<Self> {
        let name = extension.strip_prefix('.').unwrap_or(extension);
        match Self::from_name(name) {
            Some(Output::Origin) | None => None,
            other => other,
        }
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// ImageType
// =============================================================================

/// Source format as identified by the selected loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageType {
    #[default]
    Unknown,
    Jpeg,
    Png,
    Webp,
    Avif,
    Tiff,
    Gif,
    Svg,
    Pdf,
}

impl ImageType {
    /// Determine the image type from a loader name such as `"jpegload_source"`.
    pub fn from_loader(loader: &str) -> Self {
        if loader.starts_with("jpegload") {
            ImageType::Jpeg
        } else if loader.starts_with("pngload") {
            ImageType::Png
        } else if loader.starts_with("webpload") {
            ImageType::Webp
        } else if loader.starts_with("heifload") || loader.starts_with("avifload") {
            ImageType::Avif
        } else if loader.starts_with("tiffload") {
            ImageType::Tiff
        } else if loader.starts_with("gifload") {
            ImageType::Gif
        } else if loader.starts_with("svgload") {
            ImageType::Svg
        } else if loader.starts_with("pdfload") {
            ImageType::Pdf
        } else {
            ImageType::Unknown
        }
    }

    /// Whether re-encoding to this type's own format keeps an alpha channel.
    pub const fn supports_alpha(self) -> bool {
        matches!(
            self,
            ImageType::Png | ImageType::Webp | ImageType::Avif | ImageType::Tiff | ImageType::Gif
        )
    }

    /// The output format used when the caller asks for the origin format.
    pub const fn to_output(self) -> Output {
        match self {
            ImageType::Png => Output::Png,
            ImageType::Webp => Output::Webp,
            ImageType::Avif => Output::Avif,
            ImageType::Tiff => Output::Tiff,
            ImageType::Gif => Output::Gif,
            _ => Output::Jpeg,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ImageType::Unknown => "unknown",
            ImageType::Jpeg => "jpeg",
            ImageType::Png => "png",
            ImageType::Webp => "webp",
            ImageType::Avif => "avif",
            ImageType::Tiff => "tiff",
            ImageType::Gif => "gif",
            ImageType::Svg => "svg",
            ImageType::Pdf => "pdf",
        }
    }
}

// =============================================================================
// Savers
// =============================================================================

/// Bitmask of enabled output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Savers(u32);

impl Savers {
    pub const fn empty() -> Self {
        Savers(0)
    }

    pub fn all() -> Self {
        Output::SAVERS.iter().fold(Savers(0), |acc, o| acc.with(*o))
    }

    pub const fn with(self, output: Output) -> Self {
        Savers(self.0 | output.bit())
    }

    pub const fn without(self, output: Output) -> Self {
        Savers(self.0 & !output.bit())
    }

    pub const fn contains(self, output: Output) -> bool {
        self.0 & output.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Parse a comma-separated saver list such as `"jpg,png,webp"`.
    pub fn parse_list(list: &str) -> Result<Self, String> {
        let mut savers = Savers::empty();
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match Output::from_name(name) {
                Some(Output::Origin) | None => {
                    return Err(format!("Unknown saver: {}", name));
                }
                Some(output) => savers = savers.with(output),
            }
        }
        Ok(savers)
    }

    /// Comma-separated names of the enabled savers.
    pub fn names(self) -> String {
        Output::SAVERS
            .iter()
            .filter(|o| self.contains(**o))
            .map(|o| o.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for Savers {
    fn default() -> Self {
        Savers::all()
    }
}
