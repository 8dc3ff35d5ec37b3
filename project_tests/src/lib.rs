//! # Scripted Transport
//!
//! An in-memory [`Transport`] for driving the client without a network.
//! One-shot calls are answered from canned bodies keyed by path; stream
//! connects consume a script of [`Attempt`]s in order. Every request is
//! recorded, and opened/closed byte sources are counted.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use lib_shodan::{ByteSource, RequestSpec, ShodanError, ShodanResult, Transport};

/// How a scripted connection ends once its chunks are used up.
#[derive(Debug, Clone)]
pub enum Ending {
    /// The body ends cleanly.
    Close,
    /// The read fails with this error.
    Error(ShodanError),
    /// No more data ever arrives.
    Hang,
}

/// One scripted stream connect.
#[derive(Debug, Clone)]
pub enum Attempt {
    /// The connect itself fails.
    Fail(ShodanError),
    /// The connect succeeds and delivers these chunks.
    Chunks(Vec<Bytes>, Ending),
}

impl Attempt {
    /// Chunks built from string slices.
    pub fn chunks<I, S>(chunks: I, ending: Ending) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let chunks = chunks
            .into_iter()
            .map(|chunk| Bytes::copy_from_slice(chunk.as_ref().as_bytes()))
            .collect();
        Self::Chunks(chunks, ending)
    }
}

#[derive(Default)]
pub struct ScriptedTransport {
    attempts: Mutex<VecDeque<Attempt>>,
    responses: Mutex<HashMap<String, ShodanResult<Bytes>>>,
    requests: Mutex<Vec<RequestSpec>>,
    connects: AtomicUsize,
    opened: AtomicUsize,
    closed: Arc<AtomicUsize>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attempts(attempts: impl IntoIterator<Item = Attempt>) -> Self {
        let transport = Self::new();
        lock(&transport.attempts).extend(attempts);
        transport
    }

    /// Answers one-shot calls to `path` with `body`.
    pub fn respond(self, path: &str, body: &str) -> Self {
        lock(&self.responses).insert(path.to_owned(), Ok(Bytes::copy_from_slice(body.as_bytes())));
        self
    }

    /// Fails one-shot calls to `path` with `error`.
    pub fn fail(self, path: &str, error: ShodanError) -> Self {
        lock(&self.responses).insert(path.to_owned(), Err(error));
        self
    }

    pub fn requests(&self) -> Vec<RequestSpec> {
        lock(&self.requests).clone()
    }

    /// Stream connects that returned a byte source.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Byte sources that were closed by their reader.
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stream connects made so far, failed or not.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn request(&self, spec: &RequestSpec) -> ShodanResult<Bytes> {
        lock(&self.requests).push(spec.clone());
        lock(&self.responses)
            .get(spec.path())
            .cloned()
            .unwrap_or_else(|| Err(ShodanError::NotFound(spec.path().to_owned())))
    }

    async fn open_stream(&self, spec: &RequestSpec) -> ShodanResult<Box<dyn ByteSource>> {
        lock(&self.requests).push(spec.clone());
        self.connects.fetch_add(1, Ordering::SeqCst);
        let next = lock(&self.attempts).pop_front();
        match next {
            None => Err(ShodanError::NotFound("script exhausted".to_owned())),
            Some(Attempt::Fail(err)) => Err(err),
            Some(Attempt::Chunks(chunks, ending)) => {
                self.opened.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(ScriptedSource {
                    chunks: chunks.into(),
                    ending: Some(ending),
                    closed: false,
                    close_count: Arc::clone(&self.closed),
                }))
            }
        }
    }
}

struct ScriptedSource {
    chunks: VecDeque<Bytes>,
    ending: Option<Ending>,
    closed: bool,
    close_count: Arc<AtomicUsize>,
}

#[async_trait]
impl ByteSource for ScriptedSource {
    async fn next_chunk(&mut self) -> Option<ShodanResult<Bytes>> {
        if self.closed {
            return None;
        }
        if let Some(chunk) = self.chunks.pop_front() {
            return Some(Ok(chunk));
        }
        match self.ending.take() {
            Some(Ending::Error(err)) => Some(Err(err)),
            Some(Ending::Hang) => {
                self.ending = Some(Ending::Hang);
                std::future::pending::<()>().await;
                None
            }
            Some(Ending::Close) | None => None,
        }
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.close_count.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// One NDJSON banner line (newline included).
pub fn banner_line(ip: &str, port: u16) -> String {
    format!(
        "{{\"ip_str\":\"{ip}\",\"port\":{port},\"timestamp\":\"2021-03-04T05:06:07.000000\",\"data\":\"HTTP/1.1 200 OK\"}}\n"
    )
}

/// Splits `body` into chunks of at most `size` bytes, ignoring UTF-8 boundaries.
pub fn split_every(body: &str, size: usize) -> Vec<Bytes> {
    body.as_bytes()
        .chunks(size.max(1))
        .map(Bytes::copy_from_slice)
        .collect()
}
