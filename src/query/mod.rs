//! Request parameters.
//!
//! - [`QueryStore`]: typed per-request parameter store with validated reads
//! - [`Coordinate`]: pixel or percentage dimension
//! - [`Output`], [`ImageType`], [`Savers`]: format enums and the saver bitmask

mod coordinate;
mod enums;
mod store;

pub use coordinate::Coordinate;
pub use enums::{ImageType, Output, Savers};
pub use store::{parse_value, FromParam, ParamValue, QueryStore};
