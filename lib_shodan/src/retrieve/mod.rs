//! # Data Retrieval Module
//!
//! The concrete HTTP side of the client.
//!
//! - **`http`**: [`HttpTransport`], the `reqwest` implementation of the
//!   [`Transport`](crate::Transport) seam, for both one-shot calls and
//!   streaming bodies.

/// `reqwest`-backed transport.
pub mod http;

pub use http::{HttpSettings, HttpTransport};
