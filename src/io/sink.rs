use std::io::Write;

use bytes::Bytes;

use crate::error::IoError;

/// Push-style output sink.
///
/// The pipeline calls `setup` once with the output file extension (e.g.
/// `".webp"`), then `write` any number of times, then `end`.
pub trait Sink: Send {
    fn setup(&mut self, extension: &str) -> Result<(), IoError>;

    fn write(&mut self, data: &[u8]) -> Result<(), IoError>;

    fn end(&mut self) -> Result<(), IoError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkState {
    Idle,
    Writing,
    Ended,
}

fn ensure_writing(state: SinkState) -> Result<(), IoError> {
    match state {
        SinkState::Writing => Ok(()),
        SinkState::Idle => Err(IoError::SinkState("write before setup")),
        SinkState::Ended => Err(IoError::SinkState("write after end")),
    }
}

// =============================================================================
// Buffer Sink
// =============================================================================

/// Sink that collects the output in memory.
#[derive(Debug)]
pub struct BufferSink {
    extension: Option<String>,
    data: Vec<u8>,
    state: SinkState,
}

impl BufferSink {
    pub fn new() -> Self {
        Self {
            extension: None,
            data: Vec::new(),
            state: SinkState::Idle,
        }
    }

    /// Extension passed to `setup`, if any.
    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    /// Whether `end` has been called.
    pub fn is_finished(&self) -> bool {
        self.state == SinkState::Ended
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.data)
    }
}

impl Default for BufferSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for BufferSink {
    fn setup(&mut self, extension: &str) -> Result<(), IoError> {
        self.extension = Some(extension.to_string());
        self.data.clear();
        self.state = SinkState::Writing;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<(), IoError> {
        ensure_writing(self.state)?;
        self.data.extend_from_slice(data);
        Ok(())
    }

    fn end(&mut self) -> Result<(), IoError> {
        ensure_writing(self.state)?;
        self.state = SinkState::Ended;
        Ok(())
    }
}

// =============================================================================
// Writer Sink
// =============================================================================

/// Sink over any writer, typically a [`std::fs::File`]. Flushes on `end`.
pub struct WriterSink<W> {
    inner: W,
    extension: Option<String>,
    state: SinkState,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            extension: None,
            state: SinkState::Idle,
        }
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write + Send> Sink for WriterSink<W> {
    fn setup(&mut self, extension: &str) -> Result<(), IoError> {
        self.extension = Some(extension.to_string());
        self.state = SinkState::Writing;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<(), IoError> {
        ensure_writing(self.state)?;
        self.inner.write_all(data).map_err(IoError::write)
    }

    fn end(&mut self) -> Result<(), IoError> {
        ensure_writing(self.state)?;
        self.state = SinkState::Ended;
        self.inner.flush().map_err(IoError::write)
    }
}
