//! # Image Stream
//!
//! Resolves image-transformation requests into codec decode and encode
//! options, and streams the processed image from a source to a sink.
//!
//! A request is a set of query parameters (`w`, `h`, `ro`, `page`, `n`,
//! `output`, `q`, ...). The pipeline identifies the source format, selects
//! the page window of multi-page documents and animations, folds the EXIF
//! orientation into the requested rotation, enforces page and pixel limits,
//! and builds the encoder options for the requested output format.
//!
//! ## Architecture
//!
//! - [`io`] - Reference-counted blobs, pull sources and push sinks
//! - [`query`] - Typed per-request parameter store
//! - [`codec`] - Codec engine boundary and the `image`-based [`RasterCodec`]
//! - [`stream`] - Geometry, page selection, limits, save options and the pipeline
//! - [`status`] - Error to HTTP status mapping and error redirects
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use image_stream::{BufferSink, MemorySource, ProcessingConfig, QueryStore, RasterCodec, Stream};
//!
//! let codec = RasterCodec::new();
//! let config = ProcessingConfig::default();
//!
//! let mut source = MemorySource::new(std::fs::read("in.png").unwrap(), "in.png");
//! let mut query = QueryStore::parse("w=300&output=webp");
//! let mut sink = BufferSink::new();
//!
//! let processed = Stream::new(&codec, &config)
//!     .process(&mut source, &mut query, &mut sink)
//!     .unwrap();
//! assert_eq!(processed.mime_type, "image/webp");
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod io;
pub mod query;
pub mod server;
pub mod status;
pub mod stream;

// Re-export commonly used types
pub use codec::{
    CodecOptions, ImageCodec, ImageHandle, LoadInput, Loader, OptionValue, RasterCodec,
    RasterImage, TimeoutGuard, Transform,
};
pub use config::{Cli, Command, ConvertConfig, ProcessingConfig, ServeConfig};
pub use error::{CodecError, IoError, StreamError};
pub use io::{Blob, BufferSink, MemorySource, ReaderSource, Sink, Source, WriterSink};
pub use query::{Coordinate, ImageType, Output, QueryStore, Savers};
pub use server::{create_router, AppState, ErrorResponse, HealthResponse, RouterConfig};
pub use status::{redirect_target, Status};
pub use stream::{Geometry, Limits, PageWindow, Processed, Stream};
