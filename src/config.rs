//! Configuration management for Image Stream.
//!
//! The binary has two subcommands sharing one set of processing options:
//!
//! - `serve` runs the HTTP server
//! - `convert` runs a single request against a local file
//!
//! Every option can also be set through an environment variable with the
//! `IMAGE_STREAM_` prefix:
//!
//! - `IMAGE_STREAM_HOST` - Server bind address (default: 0.0.0.0)
//! - `IMAGE_STREAM_PORT` - Server port (default: 8080)
//! - `IMAGE_STREAM_SAVERS` - Enabled output formats (default: all)
//! - `IMAGE_STREAM_JPEG_QUALITY` - Default JPEG quality (default: 80)
//! - `IMAGE_STREAM_MAX_PAGES` - Maximum pages per request (default: 256)
//! - `IMAGE_STREAM_LIMIT_INPUT_PIXELS` - Maximum input pixels (default: 71000000)
//! - `IMAGE_STREAM_PROCESS_TIMEOUT` - Decode/encode timeout in seconds (default: 10)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::query::Savers;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default quality for the lossy encoders.
pub const DEFAULT_QUALITY: u8 = 80;

/// Default zlib compression level for PNG.
pub const DEFAULT_ZLIB_LEVEL: u8 = 6;

pub const DEFAULT_WEBP_EFFORT: u8 = 4;
pub const DEFAULT_AVIF_EFFORT: u8 = 4;
pub const DEFAULT_GIF_EFFORT: u8 = 7;

/// Default maximum number of pages decoded per request.
pub const DEFAULT_MAX_PAGES: u32 = 256;

/// Default input pixel limit (width x height), roughly 8400 x 8400.
pub const DEFAULT_LIMIT_INPUT_PIXELS: u64 = 71_000_000;

/// Default decode/encode timeout in seconds.
pub const DEFAULT_PROCESS_TIMEOUT: u64 = 10;

/// Default maximum request body size (bytes).
pub const DEFAULT_MAX_BODY_SIZE: usize = 100 * 1024 * 1024;

fn parse_savers(value: &str) -> Result<Savers, String> {
    Savers::parse_list(value)
}

// =============================================================================
// CLI
// =============================================================================

/// Image Stream - resolve image requests into codec operations.
#[derive(Parser, Debug, Clone)]
#[command(name = "image-stream")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeConfig),

    /// Process a single local image
    Convert(ConvertConfig),
}

// =============================================================================
// Processing Configuration
// =============================================================================

/// Process-wide settings read by every pipeline.
///
/// Shared as `Arc<ProcessingConfig>` and never mutated after startup.
#[derive(Args, Debug, Clone)]
pub struct ProcessingConfig {
    /// Enabled output formats (comma-separated: jpg,png,webp,avif,tiff,gif,json).
    #[arg(
        long,
        default_value = "jpg,png,webp,avif,tiff,gif,json",
        value_parser = parse_savers,
        env = "IMAGE_STREAM_SAVERS"
    )]
    pub savers: Savers,

    /// Default JPEG quality (1-100).
    #[arg(long, default_value_t = DEFAULT_QUALITY, env = "IMAGE_STREAM_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    /// Default WebP quality (1-100).
    #[arg(long, default_value_t = DEFAULT_QUALITY, env = "IMAGE_STREAM_WEBP_QUALITY")]
    pub webp_quality: u8,

    /// Default AVIF quality (1-100).
    #[arg(long, default_value_t = DEFAULT_QUALITY, env = "IMAGE_STREAM_AVIF_QUALITY")]
    pub avif_quality: u8,

    /// Default TIFF quality (1-100).
    #[arg(long, default_value_t = DEFAULT_QUALITY, env = "IMAGE_STREAM_TIFF_QUALITY")]
    pub tiff_quality: u8,

    /// Default PNG zlib compression level (0-9).
    #[arg(long, default_value_t = DEFAULT_ZLIB_LEVEL, env = "IMAGE_STREAM_ZLIB_LEVEL")]
    pub zlib_level: u8,

    /// CPU effort for WebP encoding (0-6).
    #[arg(long, default_value_t = DEFAULT_WEBP_EFFORT, env = "IMAGE_STREAM_WEBP_EFFORT")]
    pub webp_effort: u8,

    /// CPU effort for AVIF encoding (0-9).
    #[arg(long, default_value_t = DEFAULT_AVIF_EFFORT, env = "IMAGE_STREAM_AVIF_EFFORT")]
    pub avif_effort: u8,

    /// CPU effort for GIF encoding (1-10).
    #[arg(long, default_value_t = DEFAULT_GIF_EFFORT, env = "IMAGE_STREAM_GIF_EFFORT")]
    pub gif_effort: u8,

    /// Maximum number of pages decoded per request (0 = unlimited).
    #[arg(long, default_value_t = DEFAULT_MAX_PAGES, env = "IMAGE_STREAM_MAX_PAGES")]
    pub max_pages: u32,

    /// Maximum input width x height (0 = unlimited).
    #[arg(
        long,
        default_value_t = DEFAULT_LIMIT_INPUT_PIXELS,
        env = "IMAGE_STREAM_LIMIT_INPUT_PIXELS"
    )]
    pub limit_input_pixels: u64,

    /// Decode/encode timeout in seconds (0 = none).
    #[arg(long, default_value_t = DEFAULT_PROCESS_TIMEOUT, env = "IMAGE_STREAM_PROCESS_TIMEOUT")]
    pub process_timeout: u64,

    /// Abort on the first decode warning instead of recovering.
    #[arg(long, default_value_t = false, env = "IMAGE_STREAM_FAIL_ON_ERROR")]
    pub fail_on_error: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            savers: Savers::all(),
            jpeg_quality: DEFAULT_QUALITY,
            webp_quality: DEFAULT_QUALITY,
            avif_quality: DEFAULT_QUALITY,
            tiff_quality: DEFAULT_QUALITY,
            zlib_level: DEFAULT_ZLIB_LEVEL,
            webp_effort: DEFAULT_WEBP_EFFORT,
            avif_effort: DEFAULT_AVIF_EFFORT,
            gif_effort: DEFAULT_GIF_EFFORT,
            max_pages: DEFAULT_MAX_PAGES,
            limit_input_pixels: DEFAULT_LIMIT_INPUT_PIXELS,
            process_timeout: DEFAULT_PROCESS_TIMEOUT,
            fail_on_error: false,
        }
    }
}

impl ProcessingConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.savers.is_empty() {
            return Err("At least one saver must be enabled".to_string());
        }

        for (name, quality) in [
            ("jpeg_quality", self.jpeg_quality),
            ("webp_quality", self.webp_quality),
            ("avif_quality", self.avif_quality),
            ("tiff_quality", self.tiff_quality),
        ] {
            if !(1..=100).contains(&quality) {
                return Err(format!("{} must be between 1 and 100", name));
            }
        }

        if self.zlib_level > 9 {
            return Err("zlib_level must be between 0 and 9".to_string());
        }
        if self.webp_effort > 6 {
            return Err("webp_effort must be between 0 and 6".to_string());
        }
        if self.avif_effort > 9 {
            return Err("avif_effort must be between 0 and 9".to_string());
        }
        if !(1..=10).contains(&self.gif_effort) {
            return Err("gif_effort must be between 1 and 10".to_string());
        }

        Ok(())
    }
}

// =============================================================================
// Serve Command
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "IMAGE_STREAM_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "IMAGE_STREAM_PORT")]
    pub port: u16,

    /// Maximum accepted request body size in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_BODY_SIZE, env = "IMAGE_STREAM_MAX_BODY_SIZE")]
    pub max_body_size: usize,

    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "IMAGE_STREAM_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,

    #[command(flatten)]
    pub processing: ProcessingConfig,
}

impl ServeConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_body_size == 0 {
            return Err("max_body_size must be greater than 0".to_string());
        }
        self.processing.validate()
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// Convert Command
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ConvertConfig {
    /// Input image path.
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output path.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Request parameters as a query string, e.g. "w=300&output=webp".
    #[arg(short, long, default_value = "")]
    pub query: String,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    #[command(flatten)]
    pub processing: ProcessingConfig,
}

// =============================================================================
// Tests
// =============================================================================
