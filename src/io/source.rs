use std::io::{Read, Seek, SeekFrom};

use bytes::Bytes;

use crate::error::IoError;

use super::Blob;

/// Pull-style byte source.
///
/// The pipeline decodes a source more than once (header load, optional
/// page-size scans, final decode), so every source must be able to return
/// to its first byte via [`Source::rewind`].
pub trait Source: Send {
    /// Read up to `buf.len()` bytes, returning how many were read (0 at EOF).
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, IoError>;

    /// Reset the read position to the start of the source.
    fn rewind(&mut self) -> Result<(), IoError>;

    /// Identifier for logging (file path, request id, ...).
    fn identifier(&self) -> &str;

    /// Read at most `len` leading bytes and rewind.
    ///
    /// Used for container-format sniffing.
    fn sniff(&mut self, len: usize) -> Result<Bytes, IoError> {
        self.rewind()?;
        let mut header = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            let read = self.read(&mut header[filled..])?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        header.truncate(filled);
        self.rewind()?;
        Ok(Bytes::from(header))
    }

    /// Read the whole source into a [`Blob`].
    fn map_blob(&mut self) -> Result<Blob, IoError> {
        self.rewind()?;
        let mut data = Vec::new();
        let mut chunk = [0u8; 64 * 1024];
        loop {
            let read = self.read(&mut chunk)?;
            if read == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..read]);
        }
        self.rewind()?;
        Ok(Blob::from(data))
    }
}

// =============================================================================
// Memory Source
// =============================================================================

/// Source over bytes already in memory (e.g. an HTTP request body).
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
    position: usize,
    identifier: String,
}

impl MemorySource {
    pub fn new(data: impl Into<Bytes>, identifier: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            position: 0,
            identifier: identifier.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Source for MemorySource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, IoError> {
        let remaining = &self.data[self.position..];
        let len = remaining.len().min(buf.len());
        buf[..len].copy_from_slice(&remaining[..len]);
        self.position += len;
        Ok(len)
    }

    fn rewind(&mut self) -> Result<(), IoError> {
        self.position = 0;
        Ok(())
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn sniff(&mut self, len: usize) -> Result<Bytes, IoError> {
        Ok(self.data.slice(..len.min(self.data.len())))
    }

    fn map_blob(&mut self) -> Result<Blob, IoError> {
        // Zero-copy: the blob shares the request bytes.
        Ok(Blob::new(self.data.clone()))
    }
}

// =============================================================================
// Reader Source
// =============================================================================

/// Source over any seekable reader, typically a [`std::fs::File`].
///
/// The first [`map_blob`](Source::map_blob) reads the reader to the end and
/// keeps the blob; later calls share it without touching the reader.
pub struct ReaderSource<R> {
    inner: R,
    identifier: String,
    blob: Option<Blob>,
}

impl<R: Read + Seek + Send> ReaderSource<R> {
    pub fn new(inner: R, identifier: impl Into<String>) -> Self {
        Self {
            inner,
            identifier: identifier.into(),
            blob: None,
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek + Send> Source for ReaderSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, IoError> {
        self.inner.read(buf).map_err(IoError::read)
    }

    fn rewind(&mut self) -> Result<(), IoError> {
        self.inner
            .seek(SeekFrom::Start(0))
            .map(|_| ())
            .map_err(IoError::read)
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn map_blob(&mut self) -> Result<Blob, IoError> {
        if let Some(blob) = &self.blob {
            return Ok(blob.clone());
        }

        self.rewind()?;
        let mut data = Vec::new();
        self.inner.read_to_end(&mut data).map_err(IoError::read)?;
        self.rewind()?;

        let blob = Blob::from(data);
        self.blob = Some(blob.clone());
        Ok(blob)
    }
}
