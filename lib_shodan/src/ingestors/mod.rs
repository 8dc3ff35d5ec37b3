//! # Stream Ingestion
//!
//! Everything between a streaming HTTP body and the consumer of decoded
//! banners:
//!
//! - **`stream_connection`**: the background reader task, its state machine
//!   and the consumer-facing [`Subscription`].
//! - **`line_buffer`**: NDJSON line reassembly across arbitrary chunk splits.
//! - **`backoff`**: reconnect pacing and the per-subscription cursor.

/// Reconnect pacing.
pub mod backoff;
/// NDJSON line reassembly.
pub mod line_buffer;
/// The subscription reader task and its consumer handle.
pub mod stream_connection;

// --- Public API Re-exports ---
pub use backoff::{whole_millis, BackoffPolicy, StreamCursor};
pub use line_buffer::{Extracted, LineAccumulator};
pub use stream_connection::{
    MalformedLine, StreamConfig, StreamConnection, StreamEvent, StreamGap, StreamState,
    Subscription,
};
