//! # lib_shodan
//!
//! Client library for the Shodan host database: parameterized search and
//! lookup calls, and the long-lived banner streams.
//!
//! The always-on core is split the same way data flows through it:
//!
//! - **`request`**: pure construction of [`RequestSpec`] values from typed
//!   operations ([`Operation`], [`StreamTarget`]).
//! - **`transport`**: the injected [`Transport`] seam that actually talks HTTP.
//! - **`decode`**: turns one JSON value into one typed record ([`Record`]).
//! - **`ingestors`**: the [`StreamConnection`] that reassembles NDJSON lines,
//!   applies backpressure and reconnects with backoff.
//! - **`core`**: the [`Dispatcher`] facade wiring the pieces together.
//!
//! Optional folders are gated by cargo features: `retrieve` (reqwest transport),
//! `configs` (layered configuration) and `loggers` (tracing subscriber setup).

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod core;
pub mod decode;
pub mod error;
pub mod ingestors;
pub mod models;
pub mod request;
pub mod transport;

#[cfg(feature = "configs")]
pub mod configs;
#[cfg(feature = "loggers")]
pub mod loggers;
#[cfg(feature = "retrieve")]
pub mod retrieve;

// --- Public API Re-exports ---
pub use crate::core::dispatcher::Dispatcher;
pub use decode::{decode, decode_as, Record, RecordKind, WireRecord};
pub use error::{ShodanError, ShodanResult};
pub use ingestors::{
    BackoffPolicy, MalformedLine, StreamConfig, StreamConnection, StreamEvent, StreamGap,
    StreamState, Subscription,
};
pub use request::{
    HttpMethod, Operation, QueryListParams, RequestBuilder, RequestSpec, SortKey, SortOrder,
    StreamTarget,
};
pub use transport::{ByteSource, StreamByteSource, Transport};
