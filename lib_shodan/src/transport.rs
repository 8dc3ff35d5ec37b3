//! The injected transport seam.
//!
//! The client core never opens sockets itself. It hands [`RequestSpec`]s to a
//! [`Transport`], which returns either a complete body (one-shot calls) or a
//! [`ByteSource`] yielding the body in arbitrary chunks (subscriptions).
//! Implementations map their failures onto the crate error type; in particular a
//! retryable failure must be reported as
//! [`ShodanError::TransientNetwork`](crate::ShodanError::TransientNetwork).

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use crate::error::ShodanResult;
use crate::request::RequestSpec;

/// A chunked response body with an explicit close.
#[async_trait]
pub trait ByteSource: Send {
    /// Next chunk of the body. `None` once the body has ended.
    async fn next_chunk(&mut self) -> Option<ShodanResult<Bytes>>;

    /// Releases the underlying connection. Further reads return `None`.
    async fn close(&mut self);
}

/// Executes requests against the service.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a one-shot request and returns the full response body.
    async fn request(&self, spec: &RequestSpec) -> ShodanResult<Bytes>;

    /// Opens a streaming response.
    async fn open_stream(&self, spec: &RequestSpec) -> ShodanResult<Box<dyn ByteSource>>;
}

/// Adapts any `Stream` of byte chunks into a [`ByteSource`]. Closing drops the
/// stream, which releases whatever connection backs it.
pub struct StreamByteSource<S> {
    inner: Option<S>,
}

impl<S> StreamByteSource<S>
where
    S: Stream<Item = ShodanResult<Bytes>> + Send + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            inner: Some(stream),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

#[async_trait]
impl<S> ByteSource for StreamByteSource<S>
where
    S: Stream<Item = ShodanResult<Bytes>> + Send + Unpin,
{
    async fn next_chunk(&mut self) -> Option<ShodanResult<Bytes>> {
        match self.inner.as_mut() {
            Some(stream) => stream.next().await,
            None => None,
        }
    }

    async fn close(&mut self) {
        self.inner = None;
    }
}
