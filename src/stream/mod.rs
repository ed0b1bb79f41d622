//! The image stream pipeline.
//!
//! # Architecture
//!
//! ```text
//! Source ──► find loader ──► header load ─► page window ──► re-decode
//!                                              │
//!                                        page limit / scan
//!                                              ▼
//! Sink ◄── encode ◄── save options ◄── transform ◄── geometry ◄── pixel limit
//! ```
//!
//! Each stage reads its inputs from the per-request [`QueryStore`] and writes
//! its results back, so later stages see the resolved values.
//!
//! [`QueryStore`]: crate::query::QueryStore

mod geometry;
mod limits;
mod page;
mod pipeline;
mod save;

pub use geometry::{
    exif_transform, normalize_angle, resolve_geometry, ExifTransform, Geometry, MAX_COORD,
};
pub use limits::Limits;
pub use page::{
    page_load_options, select_page, PagePick, PageWindow, PAGE_LARGEST, PAGE_SMALLEST,
};
pub use pipeline::{Processed, Stream, StreamState};
pub use save::{
    avif_options, build_output, check_saver, frame_options, gif_options, image_to_json,
    jpeg_options, png_options, resolve_output, save_options, tiff_options, webp_options,
    ImageMetadata, OutputDescriptor,
};
