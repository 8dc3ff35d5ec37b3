//! # Stream Connection
//!
//! Turns one streaming endpoint into a lazy, cancellable sequence of decoded
//! banners. A background task owns the transport handle and the line buffer;
//! the consumer holds a [`Subscription`] on the other end of a bounded channel.
//!
//! ## Lifecycle
//!
//! `Idle → Connecting → Streaming → Backoff → Connecting → … → Closed`
//!
//! - **Connecting**: the request is opened through the [`Transport`].
//! - **Streaming**: entered on the first non-empty chunk; the failure count
//!   resets. Chunks are split into lines, each line is decoded on its own.
//! - **Backoff**: a transient failure (network error, read timeout, 5xx, end
//!   of body) drops the partial line, reports a [`StreamGap`] and waits before
//!   reconnecting. Running out of attempts ends in `ConnectionLost`.
//! - **Closed**: terminal. Reached on cancellation, on a fatal error (which is
//!   delivered once as `Err`) or when the consumer goes away.
//!
//! The channel is the backpressure point: when the consumer falls behind, the
//! task waits on `send` rather than dropping or buffering without bound.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::Stream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::backoff::{whole_millis, BackoffPolicy, StreamCursor};
use super::line_buffer::{Extracted, LineAccumulator};
use crate::decode::decode_line;
use crate::error::{ShodanError, ShodanResult};
use crate::models::Banner;
use crate::request::RequestSpec;
use crate::transport::{ByteSource, Transport};

const PREVIEW_CHARS: usize = 120;

/// Tuning for a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Decoded events buffered ahead of the consumer.
    pub buffer_capacity: usize,
    /// Longest silence tolerated on an open connection (also bounds the
    /// connect itself).
    pub read_timeout: Duration,
    /// Lines longer than this are dropped and reported as malformed.
    pub max_line_bytes: usize,
    pub backoff: BackoffPolicy,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 1024,
            read_timeout: Duration::from_millis(90_000),
            max_line_bytes: 16 * 1024 * 1024,
            backoff: BackoffPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamState {
    Idle,
    Connecting,
    Streaming,
    Backoff,
    Closed,
}

/// A reconnect happened; banners published in between are lost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamGap {
    /// Consecutive failure count, starting at 1.
    pub attempt: u32,
    /// Wait before the next connect.
    pub delay: Duration,
    /// The failure that broke the connection.
    pub reason: String,
    /// Bytes of an unfinished line thrown away.
    pub discarded_bytes: usize,
}

impl StreamGap {
    pub fn delay_ms(&self) -> u64 {
        whole_millis(self.delay)
    }
}

/// A line that did not decode. The stream continues after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedLine {
    pub preview: String,
    pub error: ShodanError,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Banner(Banner),
    Gap(StreamGap),
    Malformed(MalformedLine),
}

impl StreamEvent {
    pub fn into_banner(self) -> Option<Banner> {
        match self {
            Self::Banner(banner) => Some(banner),
            _ => None,
        }
    }
}

/// One logical subscription, ready to start.
pub struct StreamConnection {
    transport: Arc<dyn Transport>,
    spec: RequestSpec,
    config: StreamConfig,
}

impl StreamConnection {
    pub fn new(transport: Arc<dyn Transport>, spec: RequestSpec, config: StreamConfig) -> Self {
        Self {
            transport,
            spec,
            config,
        }
    }

    /// Spawns the reader task. Must be called inside a tokio runtime.
    pub fn subscribe(self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.config.buffer_capacity.max(1));
        let (state_tx, state_rx) = watch::channel(StreamState::Idle);
        let cancel = CancellationToken::new();
        let path = self.spec.path().to_owned();

        let driver = Driver {
            lines: LineAccumulator::new(self.config.max_line_bytes),
            transport: self.transport,
            spec: self.spec,
            config: self.config,
            tx,
            state: state_tx,
            cancel: cancel.clone(),
            cursor: StreamCursor::default(),
        };
        let task = tokio::spawn(driver.run());

        Subscription {
            rx,
            state: state_rx,
            cancel,
            task: Some(task),
            path,
        }
    }
}

/// Why the reader task stopped.
enum Stop {
    Cancelled,
    ConsumerGone,
    Fatal(ShodanError),
}

struct Driver {
    transport: Arc<dyn Transport>,
    spec: RequestSpec,
    config: StreamConfig,
    tx: mpsc::Sender<ShodanResult<StreamEvent>>,
    state: watch::Sender<StreamState>,
    cancel: CancellationToken,
    cursor: StreamCursor,
    lines: LineAccumulator,
}

impl Driver {
    async fn run(mut self) {
        let stop = self.drive().await;
        match stop {
            Stop::Cancelled => debug!(path = %self.spec.path(), "Subscription cancelled"),
            Stop::ConsumerGone => debug!(path = %self.spec.path(), "Subscriber dropped"),
            Stop::Fatal(err) => {
                error!(path = %self.spec.path(), error = %err, "Subscription terminated");
                let _ = self.emit(Err(err)).await;
            }
        }
        self.lines.clear();
        self.set_state(StreamState::Closed);
    }

    async fn drive(&mut self) -> Stop {
        loop {
            self.set_state(StreamState::Connecting);
            info!(spec = %self.spec, attempt = self.cursor.failures(), "Opening stream");

            let opened = self.open().await;
            let failure = match opened {
                Err(stop) => return stop,
                Ok(Err(err)) => err,
                Ok(Ok(source)) => match self.pump(source).await {
                    Err(stop) => return stop,
                    Ok(err) => err,
                },
            };

            if !failure.is_transient() {
                return Stop::Fatal(failure);
            }

            let attempt = self.cursor.record_failure();
            let policy = &self.config.backoff;
            if policy.exhausted(attempt) {
                return Stop::Fatal(ShodanError::ConnectionLost {
                    attempts: policy.max_attempts,
                    last_error: failure.to_string(),
                });
            }

            let delay = policy.jittered(attempt);
            let discarded_bytes = self.lines.clear();
            self.set_state(StreamState::Backoff);
            warn!(
                path = %self.spec.path(),
                attempt,
                delay_ms = whole_millis(delay),
                discarded_bytes,
                error = %failure,
                "Stream interrupted, banners may be missed until reconnect"
            );

            let gap = StreamGap {
                attempt,
                delay,
                reason: failure.to_string(),
                discarded_bytes,
            };
            if let Err(stop) = self.emit(Ok(StreamEvent::Gap(gap))).await {
                return stop;
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Stop::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn open(&self) -> Result<ShodanResult<Box<dyn ByteSource>>, Stop> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Stop::Cancelled),
            opened = tokio::time::timeout(
                self.config.read_timeout,
                self.transport.open_stream(&self.spec),
            ) => Ok(opened.unwrap_or_else(|_| {
                Err(ShodanError::TransientNetwork(format!(
                    "no response within {:?}",
                    self.config.read_timeout
                )))
            })),
        }
    }

    /// Reads until the connection fails. The source is always closed before
    /// returning.
    async fn pump(&mut self, mut source: Box<dyn ByteSource>) -> Result<ShodanError, Stop> {
        let outcome = self.read_loop(source.as_mut()).await;
        source.close().await;
        outcome
    }

    async fn read_loop(&mut self, source: &mut dyn ByteSource) -> Result<ShodanError, Stop> {
        let read_timeout = self.config.read_timeout;
        loop {
            let read = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Stop::Cancelled),
                read = tokio::time::timeout(read_timeout, source.next_chunk()) => read,
            };

            let chunk = match read {
                Err(_) => {
                    return Ok(ShodanError::TransientNetwork(format!(
                        "no data for {read_timeout:?}"
                    )))
                }
                Ok(None) => {
                    return Ok(ShodanError::TransientNetwork(
                        "stream closed by the service".to_string(),
                    ))
                }
                Ok(Some(Err(err))) => return Ok(err),
                Ok(Some(Ok(chunk))) => chunk,
            };
            if chunk.is_empty() {
                continue;
            }

            if self.cursor.record_delivery() {
                self.set_state(StreamState::Streaming);
                info!(path = %self.spec.path(), "Stream established");
            }
            trace!(bytes = chunk.len(), "Chunk received");

            self.lines.push(&chunk);
            while let Some(extracted) = self.lines.next_line() {
                let event = self.to_event(extracted);
                self.emit(Ok(event)).await?;
            }
        }
    }

    fn to_event(&self, extracted: Extracted) -> StreamEvent {
        match extracted {
            Extracted::Line(line) => match decode_line(&line) {
                Ok(banner) => {
                    trace!(port = banner.port, ip = %banner.ip_str, "Banner decoded");
                    StreamEvent::Banner(banner)
                }
                Err(error) => {
                    let preview = preview(&line);
                    warn!(path = %self.spec.path(), %preview, %error, "Skipping malformed line");
                    StreamEvent::Malformed(MalformedLine { preview, error })
                }
            },
            Extracted::Oversized(len) => {
                let limit = self.config.max_line_bytes;
                warn!(path = %self.spec.path(), len, limit, "Skipping oversized line");
                StreamEvent::Malformed(MalformedLine {
                    preview: String::new(),
                    error: ShodanError::malformed(
                        "banner",
                        format!("line of {len} bytes exceeds the {limit} byte limit"),
                    ),
                })
            }
        }
    }

    async fn emit(&self, item: ShodanResult<StreamEvent>) -> Result<(), Stop> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Stop::Cancelled),
            sent = self.tx.send(item) => sent.map_err(|_| Stop::ConsumerGone),
        }
    }

    fn set_state(&self, state: StreamState) {
        self.state.send_replace(state);
    }
}

fn preview(line: &[u8]) -> String {
    String::from_utf8_lossy(line).chars().take(PREVIEW_CHARS).collect()
}

/// Consumer end of a subscription.
///
/// Yields banners, gap notices and malformed-line notices in wire order. The
/// sequence ends after cancellation, or after a terminal error has been
/// yielded once. Dropping the subscription cancels it.
pub struct Subscription {
    rx: mpsc::Receiver<ShodanResult<StreamEvent>>,
    state: watch::Receiver<StreamState>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    path: String,
}

impl Subscription {
    /// Waits for the next event. `None` once the subscription is over.
    pub async fn next_event(&mut self) -> Option<ShodanResult<StreamEvent>> {
        if self.cancel.is_cancelled() {
            return None;
        }
        self.rx.recv().await
    }

    pub fn state(&self) -> StreamState {
        *self.state.borrow()
    }

    /// A receiver that observes every state transition.
    pub fn state_watch(&self) -> watch::Receiver<StreamState> {
        self.state.clone()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Stops the subscription. Buffered events are discarded, and this
    /// returns once the reader task has closed the transport.
    pub async fn cancel(&mut self) {
        self.cancel.cancel();
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(path = %self.path, error = %err, "Stream task did not shut down cleanly");
            }
        }
    }
}

impl Stream for Subscription {
    type Item = ShodanResult<StreamEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        this.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("path", &self.path)
            .field("state", &self.state())
            .finish()
    }
}
