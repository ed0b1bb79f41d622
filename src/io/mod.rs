mod blob;
mod sink;
mod source;

pub use blob::Blob;
pub use sink::{BufferSink, Sink, WriterSink};
pub use source::{MemorySource, ReaderSource, Source};
