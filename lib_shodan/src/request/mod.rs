//! # Request Construction
//!
//! Pure, side-effect free building of request descriptions. Nothing here
//! touches the network; the [`Transport`](crate::Transport) executes what is
//! built here.

/// Validation and ordering of parameters into a [`RequestSpec`].
pub mod builder;
/// Typed operation and stream descriptors.
pub mod operation;
/// The immutable request value.
pub mod spec;

pub use builder::RequestBuilder;
pub use operation::{Operation, QueryListParams, SortKey, SortOrder, StreamTarget};
pub use spec::{HttpMethod, RequestSpec};
