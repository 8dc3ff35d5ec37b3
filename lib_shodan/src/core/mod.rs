//! # Core Facade
//!
//! - **`dispatcher`**: composes request building, the injected transport and
//!   record decoding into one-shot calls and stream subscriptions.

/// The client facade.
pub mod dispatcher;

// --- Public API Re-exports ---
pub use dispatcher::Dispatcher;
