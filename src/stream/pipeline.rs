//! The request pipeline: identify, load, resolve, check, transform, encode.

use tracing::debug;

use crate::codec::{
    Access, CodecOptions, ImageCodec, ImageHandle, LoadInput, Loader, TimeoutGuard, Transform,
};
use crate::config::ProcessingConfig;
use crate::error::StreamError;
use crate::io::{Blob, Sink, Source};
use crate::query::{ImageType, Output, QueryStore};

use super::geometry::resolve_geometry;
use super::limits::Limits;
use super::page::{page_load_options, select_page};
use super::save::{build_output, image_to_json};

/// Pipeline states, logged at each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Opened,
    HeaderLoaded,
    PageResolved,
    LimitChecked,
    GeometryResolved,
    Decoded,
    Encoded,
    Written,
}

/// Result of a successful [`Stream::process`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Processed {
    pub output: Output,
    pub extension: &'static str,
    pub mime_type: &'static str,
}

/// Where repeated loads of the same source read from.
enum Input {
    Source,
    Blob(Blob),
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// One request pipeline over a codec engine and the process configuration.
///
/// Request state lives in the [`QueryStore`] passed to each call; a `Stream`
/// holds only shared read-only references and can be created per request.
pub struct Stream<'a, C: ImageCodec> {
    codec: &'a C,
    config: &'a ProcessingConfig,
}

impl<'a, C: ImageCodec> Stream<'a, C> {
    pub fn new(codec: &'a C, config: &'a ProcessingConfig) -> Self {
        Self { codec, config }
    }

    /// Identify, load and resolve an image.
    ///
    /// On return the image holds the resolved page window, and `query`
    /// carries `type`, `n`, `page`, the resolved geometry and `page_height`.
    /// The process timeout is checked before every load.
    pub fn new_from_source(
        &self,
        source: &mut dyn Source,
        query: &mut QueryStore,
    ) -> Result<C::Image, StreamError> {
        let guard = TimeoutGuard::new(self.config.process_timeout);
        self.open(source, query, &guard)
    }

    fn open(
        &self,
        source: &mut dyn Source,
        query: &mut QueryStore,
        guard: &TimeoutGuard,
    ) -> Result<C::Image, StreamError> {
        let (loader, input) = match self.codec.find_loader(source)? {
            Some(loader) => (loader, Input::Source),
            None => {
                // Fall back to the buffer sniff
                let blob = source.map_blob()?;
                let loader = self
                    .codec
                    .find_loader_buffer(blob.as_slice())
                    .ok_or_else(|| StreamError::InvalidImage {
                        message: format!(
                            "Unable to identify image format of {}",
                            source.identifier()
                        ),
                    })?;
                (loader, Input::Blob(blob))
            }
        };

        let image_type = loader.image_type();
        query.update("type", image_type);

        debug!(
            state = ?StreamState::Opened,
            source = source.identifier(),
            loader = loader.name(),
            image_type = image_type.name(),
            "Stream state"
        );

        // Trim scans the whole image, which sequential access cannot do
        let access = if query.get("trim", 0) != 0 {
            Access::Random
        } else {
            Access::Sequential
        };
        let base_options = CodecOptions::new()
            .set("access", access)
            .set("fail", self.config.fail_on_error);

        let mut image = self.load(source, &input, &loader, &base_options, guard)?;
        let n_pages = to_i32(image.n_pages()).max(1);

        debug!(
            state = ?StreamState::HeaderLoaded,
            width = image.width(),
            height = image.height(),
            n_pages,
            "Stream state"
        );

        let limits = Limits::from_config(self.config);
        let mut window = page_load_options(query, n_pages);

        if !window.is_first() {
            limits.check_pages(window.n)?;

            if let Some(pick) = window.pick() {
                let first = (image.width(), image.page_height());
                window.page = select_page(first, n_pages, pick, |page| {
                    let options = base_options.clone().set("page", page);
                    let header = self.load(source, &input, &loader, &options, guard)?;
                    Ok::<_, StreamError>((header.width(), header.page_height()))
                })?;
            }

            let options = base_options
                .clone()
                .set("n", window.n)
                .set("page", window.page);
            image = self.load(source, &input, &loader, &options, guard)?;
        }

        debug!(
            state = ?StreamState::PageResolved,
            n = window.n,
            page = window.page,
            "Stream state"
        );

        limits.check_pixels(image.width(), image.height())?;

        debug!(state = ?StreamState::LimitChecked, "Stream state");

        query.update("n", window.n);
        query.update("page", window.page);

        // Fits after the pixel check
        let height = u32::try_from(image.height()).unwrap_or(u32::MAX);
        resolve_geometry(query, image.width(), height, image.orientation());
        query.update("page_height", to_i32(image.page_height()));

        debug!(state = ?StreamState::GeometryResolved, "Stream state");

        Ok(image)
    }

    /// Encode `image` according to `query` and write it to `sink`.
    ///
    /// JSON output writes the image metadata and skips the encoder.
    pub fn write_to_sink(
        &self,
        image: &C::Image,
        query: &QueryStore,
        sink: &mut dyn Sink,
        guard: &TimeoutGuard,
    ) -> Result<Processed, StreamError> {
        let image_type = query.get("type", ImageType::Unknown);
        let descriptor = build_output(query, self.config, image_type, image.has_alpha())?;

        sink.setup(descriptor.extension)?;
        if descriptor.is_json() {
            let json = image_to_json(image, image_type)?;
            sink.write(&json)?;
        } else {
            self.codec
                .save(image, descriptor.extension, &descriptor.options, sink, guard)?;
        }

        debug!(
            state = ?StreamState::Encoded,
            output = %descriptor.output,
            "Stream state"
        );

        sink.end()?;

        debug!(state = ?StreamState::Written, "Stream state");

        Ok(Processed {
            output: descriptor.output,
            extension: descriptor.extension,
            mime_type: descriptor.output.mime_type(),
        })
    }

    /// Run the whole pipeline from `source` to `sink`.
    pub fn process(
        &self,
        source: &mut dyn Source,
        query: &mut QueryStore,
        sink: &mut dyn Sink,
    ) -> Result<Processed, StreamError> {
        let guard = TimeoutGuard::new(self.config.process_timeout);

        let image = self.open(source, query, &guard)?;

        guard.check()?;
        let image = self
            .codec
            .transform(image, &resolved_transform(query), &guard)?;
        query.update("page_height", to_i32(image.page_height()));

        debug!(
            state = ?StreamState::Decoded,
            width = image.width(),
            height = image.height(),
            "Stream state"
        );

        self.write_to_sink(&image, query, sink, &guard)
    }

    fn load(
        &self,
        source: &mut dyn Source,
        input: &Input,
        loader: &Loader,
        options: &CodecOptions,
        guard: &TimeoutGuard,
    ) -> Result<C::Image, StreamError> {
        guard.check()?;
        let input = match input {
            Input::Source => {
                source.rewind()?;
                LoadInput::Source(source)
            }
            Input::Blob(blob) => LoadInput::Blob(blob),
        };
        Ok(self.codec.load(input, loader, options)?)
    }
}

/// Transform from the geometry written back by [`resolve_geometry`].
fn resolved_transform(query: &QueryStore) -> Transform {
    let dimension = |key: &str| u32::try_from(query.get(key, 0)).unwrap_or(0);
    Transform {
        width: dimension("w"),
        height: dimension("h"),
        angle: dimension("angle"),
        flip: query.get("flip", false),
        flop: query.get("flop", false),
    }
}
