use crate::config::ProcessingConfig;
use crate::error::StreamError;

/// Page-count and pixel-count ceilings. 0 disables a ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_pages: u32,
    pub limit_input_pixels: u64,
}

impl Limits {
    pub fn new(max_pages: u32, limit_input_pixels: u64) -> Self {
        Self {
            max_pages,
            limit_input_pixels,
        }
    }

    pub fn from_config(config: &ProcessingConfig) -> Self {
        Self::new(config.max_pages, config.limit_input_pixels)
    }

    /// Reject a request for more than `max_pages` pages.
    pub fn check_pages(&self, n: i32) -> Result<(), StreamError> {
        if self.max_pages > 0 && i64::from(n) > i64::from(self.max_pages) {
            return Err(StreamError::TooLargeImage {
                message: format!(
                    "Input image exceeds the maximum number of pages. \
                     Number of pages should be less than {}",
                    self.max_pages
                ),
            });
        }
        Ok(())
    }

    /// Reject an image whose `width * height` exceeds the pixel limit.
    ///
    /// `height` is the stacked height of the loaded page window. Heights
    /// beyond `u32::MAX` are rejected even when the pixel limit is disabled.
    pub fn check_pixels(&self, width: u32, height: u64) -> Result<(), StreamError> {
        let pixels = u64::from(width).saturating_mul(height);
        if self.limit_input_pixels > 0 && pixels > self.limit_input_pixels {
            return Err(StreamError::TooLargeImage {
                message: format!(
                    "Input image exceeds pixel limit. \
                     Width x height should be less than {}",
                    self.limit_input_pixels
                ),
            });
        }
        if u32::try_from(height).is_err() {
            return Err(StreamError::TooLargeImage {
                message: format!(
                    "Input image exceeds the maximum height of {} pixels",
                    u32::MAX
                ),
            });
        }
        Ok(())
    }
}
