//! # Record Decoding
//!
//! - **`decoder`**: one JSON value in, one typed record (or a
//!   `MalformedRecord` error) out.
//! - **`lenient`**: the serde helpers that absorb the service's type quirks.

/// Typed decoding entry points.
pub mod decoder;
pub(crate) mod lenient;

pub use decoder::{decode, decode_as, decode_body, decode_line, Record, RecordKind, WireRecord};
