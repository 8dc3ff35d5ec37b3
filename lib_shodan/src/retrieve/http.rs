//! # HTTP Transport
//!
//! The production [`Transport`]: an asynchronous client around `reqwest`.
//! One-shot calls go to the API host, subscriptions go to the stream host.
//! No retry middleware: one-shot calls report every failure to the caller and
//! streams reconnect on their own.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::{Client, Method, Response};
use url::Url;
use tracing::debug;

use crate::error::{classify_status, ShodanError, ShodanResult};
use crate::request::{HttpMethod, RequestSpec};
use crate::transport::{ByteSource, StreamByteSource, Transport};

/// Connection settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Base for one-shot calls, e.g. `https://api.shodan.io/`.
    pub api_base: String,
    /// Base for subscriptions, e.g. `https://stream.shodan.io/`.
    pub stream_base: String,
    /// Whole-request timeout for one-shot calls. Not applied to streams.
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.shodan.io/".to_string(),
            stream_base: "https://stream.shodan.io/".to_string(),
            request_timeout: Duration::from_millis(30_000),
            connect_timeout: Duration::from_millis(10_000),
            user_agent: concat!("lib_shodan/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// A `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// Shared connection pool.
    inner: Client,
    api_base: Url,
    stream_base: Url,
    request_timeout: Duration,
}

impl HttpTransport {
    /// Creates a new transport.
    ///
    /// # Errors
    /// Returns `InvalidParameter` if a base URL is not absolute, and
    /// `Config` if the client cannot be built.
    pub fn new(settings: HttpSettings) -> ShodanResult<Self> {
        // Base URLs must end with '/' so that `join` appends instead of replacing
        let api_base = parse_base("api_base", &settings.api_base)?;
        let stream_base = parse_base("stream_base", &settings.stream_base)?;

        let inner = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .user_agent(settings.user_agent)
            .build()
            .map_err(|err| ShodanError::Config(format!("HTTP client: {err}")))?;

        Ok(Self {
            inner,
            api_base,
            stream_base,
            request_timeout: settings.request_timeout,
        })
    }

    /// Absolute URL for a request relative to `base`, query parameters in order.
    pub fn url_for(base: &Url, spec: &RequestSpec) -> ShodanResult<Url> {
        let mut url = base
            .join(spec.path())
            .map_err(|err| ShodanError::invalid("path", format!("{}: {err}", spec.path())))?;
        if !spec.query().is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in spec.query() {
                pairs.append_pair(name, value);
            }
        }
        Ok(url)
    }

    async fn send(&self, base: &Url, spec: &RequestSpec, timeout: Option<Duration>) -> ShodanResult<Response> {
        // 1. Construct the full absolute URL
        let url = Self::url_for(base, spec)?;
        let method = match spec.method() {
            HttpMethod::Get => Method::GET,
        };

        // 2. Streams carry no overall deadline
        let mut req = self.inner.request(method, url);
        if let Some(timeout) = timeout {
            req = req.timeout(timeout);
        }

        // 3. Execute and map non-success statuses onto the error taxonomy
        debug!(%spec, "Sending HTTP request");
        let response = req.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status.as_u16(), &body))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, spec: &RequestSpec) -> ShodanResult<Bytes> {
        let response = self
            .send(&self.api_base, spec, Some(self.request_timeout))
            .await?;
        response.bytes().await.map_err(map_reqwest_error)
    }

    async fn open_stream(&self, spec: &RequestSpec) -> ShodanResult<Box<dyn ByteSource>> {
        let response = self.send(&self.stream_base, spec, None).await?;
        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(map_reqwest_error));
        Ok(Box::new(StreamByteSource::new(Box::pin(chunks))))
    }
}

fn parse_base(name: &str, raw: &str) -> ShodanResult<Url> {
    let mut raw = raw.trim().to_string();
    if !raw.ends_with('/') {
        raw.push('/');
    }
    let url = Url::parse(&raw).map_err(|err| ShodanError::invalid(name, format!("{raw}: {err}")))?;
    if url.cannot_be_a_base() {
        return Err(ShodanError::invalid(name, format!("{raw} cannot be a base URL")));
    }
    Ok(url)
}

/// Everything that goes wrong on the wire is retryable from the stream's
/// point of view; only a request that could not even be built is not.
fn map_reqwest_error(err: reqwest::Error) -> ShodanError {
    if err.is_builder() {
        return ShodanError::invalid("request", err.to_string());
    }
    if let Some(status) = err.status() {
        return classify_status(status.as_u16(), &err.to_string());
    }
    let kind = if err.is_timeout() {
        "timeout"
    } else if err.is_connect() {
        "connect"
    } else if err.is_body() || err.is_decode() {
        "body"
    } else {
        "request"
    };
    ShodanError::TransientNetwork(format!("{kind}: {err}"))
}
