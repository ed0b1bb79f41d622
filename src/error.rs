use thiserror::Error;

/// I/O errors raised by sources and sinks.
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Reading from the source failed
    #[error("Read error: {0}")]
    Read(String),

    /// Writing to the sink failed
    #[error("Write error: {0}")]
    Write(String),

    /// Sink was written to before `setup` or after `end`
    #[error("Sink not ready: {0}")]
    SinkState(&'static str),
}

impl IoError {
    pub(crate) fn read(err: std::io::Error) -> Self {
        IoError::Read(err.to_string())
    }

    pub(crate) fn write(err: std::io::Error) -> Self {
        IoError::Write(err.to_string())
    }
}

/// Errors reported by a codec engine.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// I/O error while reading the source or writing the sink
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// The source could not be decoded with the selected loader
    #[error("Decode failed: {message}")]
    Decode { message: String },

    /// The image could not be encoded to the requested format
    #[error("Encode failed: {message}")]
    Encode { message: String },

    /// The engine has no implementation for the requested format
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// The timeout guard expired while work was in flight
    #[error("Maximum image processing time of {seconds} seconds exceeded")]
    Timeout { seconds: u64 },
}

impl CodecError {
    pub fn decode(message: impl Into<String>) -> Self {
        CodecError::Decode {
            message: message.into(),
        }
    }

    pub fn encode(message: impl Into<String>) -> Self {
        CodecError::Encode {
            message: message.into(),
        }
    }
}

/// Terminal errors of the stream pipeline.
///
/// None of these are retried; each maps to a distinct HTTP status
/// (see [`crate::status::Status`]).
#[derive(Debug, Clone, Error)]
pub enum StreamError {
    /// No loader matched the source, not even the generic buffer sniff
    #[error("Invalid image: {message}")]
    InvalidImage { message: String },

    /// A loader matched but decoding failed
    #[error("Image not readable: {message}")]
    UnreadableImage { message: String },

    /// Page-count or pixel-count ceiling exceeded
    #[error("{message}")]
    TooLargeImage { message: String },

    /// Output format is disabled by configuration
    #[error("{message}")]
    UnsupportedSaver { message: String },

    /// Decode/encode exceeded the configured process timeout
    #[error("Maximum image processing time of {seconds} seconds exceeded")]
    Timeout { seconds: u64 },

    /// Encoder failure
    #[error("Failed to encode image: {message}")]
    Encode { message: String },

    /// Source or sink failure
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}

impl From<CodecError> for StreamError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(io) => StreamError::Io(io),
            CodecError::Decode { message } => StreamError::UnreadableImage { message },
            CodecError::Encode { message } => StreamError::Encode { message },
            CodecError::Unsupported(message) => StreamError::Encode { message },
            CodecError::Timeout { seconds } => StreamError::Timeout { seconds },
        }
    }
}
