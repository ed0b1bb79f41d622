//! Reference-counted source bytes.
//!
//! A [`Blob`] is handed to the codec for every decode pass. Cloning it only
//! bumps a reference count, so the header pass, the page-size scans and the
//! final decode all share one copy of the source bytes. The storage is
//! released when the last clone is dropped.

use std::ops::Deref;

use bytes::Bytes;

/// Shared, immutable byte buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blob {
    data: Bytes,
}

impl Blob {
    /// Wrap existing bytes without copying.
    pub fn new(data: Bytes) -> Self {
        Self { data }
    }

    /// Get the underlying bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    /// Get the data as a slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether two blobs reference the same storage.
    pub fn shares_storage(&self, other: &Blob) -> bool {
        self.data.as_ptr() == other.data.as_ptr() && self.data.len() == other.data.len()
    }
}

impl From<Vec<u8>> for Blob {
    fn from(data: Vec<u8>) -> Self {
        Self::new(Bytes::from(data))
    }
}

impl From<Bytes> for Blob {
    fn from(data: Bytes) -> Self {
        Self::new(data)
    }
}

impl Deref for Blob {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl AsRef<[u8]> for Blob {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
