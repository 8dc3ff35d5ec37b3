//! # Configuration Modules
//!
//! Layered client configuration: defaults, JSON file, environment and
//! explicit overrides.

/// Provides the layered client options and their resolved form.
pub mod config_client;

pub use config_client::{ClientConfig, ClientOptions};
