//! # Dispatcher
//!
//! The facade callers talk to. It wires the [`RequestBuilder`], an injected
//! [`Transport`] and the record decoder together, and picks the decode target
//! for each endpoint. It adds no retry of its own: one-shot calls surface
//! every error as-is, and stream subscriptions retry only inside the
//! [`StreamConnection`].

use std::sync::Arc;

use tracing::{debug, warn};

use crate::decode::{decode, decode_body, Record, RecordKind, WireRecord};
use crate::error::{ShodanError, ShodanResult};
use crate::ingestors::{StreamConfig, StreamConnection, Subscription};
use crate::models::{
    Account, ApiStatus, DnsHostname, DnsIp, ExternalIp, FacetReport, HoneyScore, Host,
    HostReport, HttpHeaders, Protocol, QueryReport, TagReport, TokenReport,
};
use crate::request::{Operation, QueryListParams, RequestBuilder, RequestSpec, StreamTarget};
use crate::transport::Transport;

/// Client entry point. Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct Dispatcher {
    builder: RequestBuilder,
    transport: Arc<dyn Transport>,
    stream_config: StreamConfig,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("builder", &self.builder)
            .field("stream_config", &self.stream_config)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Fails with `InvalidParameter` when the key is blank.
    pub fn new(api_key: impl Into<String>, transport: Arc<dyn Transport>) -> ShodanResult<Self> {
        Ok(Self {
            builder: RequestBuilder::new(api_key)?,
            transport,
            stream_config: StreamConfig::default(),
        })
    }

    /// Builds a dispatcher over the reqwest transport from a resolved config.
    #[cfg(all(feature = "retrieve", feature = "configs"))]
    pub fn connect(config: &crate::configs::ClientConfig) -> ShodanResult<Self> {
        use crate::retrieve::{HttpSettings, HttpTransport};

        let transport = HttpTransport::new(HttpSettings {
            api_base: config.api_base_url.clone(),
            stream_base: config.stream_base_url.clone(),
            request_timeout: config.request_timeout,
            connect_timeout: config.connect_timeout,
            user_agent: HttpSettings::default().user_agent,
        })?;
        Ok(Self::new(config.api_key.clone(), Arc::new(transport))?
            .with_stream_config(config.stream_config()))
    }

    pub fn with_stream_config(mut self, stream_config: StreamConfig) -> Self {
        self.stream_config = stream_config;
        self
    }

    pub fn builder(&self) -> &RequestBuilder {
        &self.builder
    }

    pub fn stream_config(&self) -> &StreamConfig {
        &self.stream_config
    }

    /// Runs a one-shot request and decodes the body as `T`.
    pub async fn execute<T: WireRecord>(&self, spec: &RequestSpec) -> ShodanResult<T> {
        let body = self.fetch(spec).await?;
        decode_body::<T>(&body)
            .inspect_err(|err| warn!(%spec, error = %err, "Response did not decode"))
    }

    /// Runs a one-shot request and decodes the body as the given kind.
    pub async fn execute_kind(&self, spec: &RequestSpec, kind: RecordKind) -> ShodanResult<Record> {
        let body = self.fetch(spec).await?;
        let value: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|err| ShodanError::malformed(kind.as_str(), format!("invalid JSON: {err}")))?;
        decode(kind, &value).inspect_err(|err| warn!(%spec, error = %err, "Response did not decode"))
    }

    /// Builds, runs and decodes any operation.
    pub async fn call(&self, operation: &Operation) -> ShodanResult<Record> {
        let spec = self.builder.build(operation)?;
        self.execute_kind(&spec, operation.record_kind()).await
    }

    /// Starts a banner subscription.
    pub fn subscribe(&self, target: &StreamTarget) -> ShodanResult<Subscription> {
        let spec = self.builder.build_stream(target)?;
        Ok(self.subscribe_spec(spec))
    }

    /// Starts a subscription for a prebuilt streaming request.
    pub fn subscribe_spec(&self, spec: RequestSpec) -> Subscription {
        debug!(%spec, "Subscribing");
        StreamConnection::new(Arc::clone(&self.transport), spec, self.stream_config.clone())
            .subscribe()
    }

    async fn fetch(&self, spec: &RequestSpec) -> ShodanResult<bytes::Bytes> {
        debug!(%spec, "Executing request");
        self.transport
            .request(spec)
            .await
            .inspect_err(|err| warn!(%spec, error = %err, "Request failed"))
    }

    async fn run<T: WireRecord>(&self, operation: Operation) -> ShodanResult<T> {
        debug_assert_eq!(operation.record_kind(), T::KIND);
        let spec = self.builder.build(&operation)?;
        self.execute(&spec).await
    }

    pub async fn protocols(&self) -> ShodanResult<Vec<Protocol>> {
        self.run(Operation::Protocols).await
    }

    pub async fn reverse_dns<I, S>(&self, ips: I) -> ShodanResult<Vec<DnsHostname>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ips = ips.into_iter().map(Into::into).collect();
        self.run(Operation::ReverseDns { ips }).await
    }

    pub async fn resolve_dns<I, S>(&self, hostnames: I) -> ShodanResult<Vec<DnsIp>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let hostnames = hostnames.into_iter().map(Into::into).collect();
        self.run(Operation::ResolveDns { hostnames }).await
    }

    pub async fn crawled_ports(&self) -> ShodanResult<Vec<u16>> {
        self.run(Operation::CrawledPorts).await
    }

    pub async fn query_tokens(&self, query: &str) -> ShodanResult<TokenReport> {
        self.run(Operation::QueryTokens {
            query: query.to_owned(),
        })
        .await
    }

    pub async fn saved_queries(&self, params: QueryListParams) -> ShodanResult<QueryReport> {
        self.run(Operation::SavedQueries(params)).await
    }

    pub async fn search_queries(&self, query: &str, page: Option<u32>) -> ShodanResult<QueryReport> {
        self.run(Operation::SearchQueries {
            query: query.to_owned(),
            page,
        })
        .await
    }

    pub async fn query_tags(&self, size: Option<u32>) -> ShodanResult<TagReport> {
        self.run(Operation::QueryTags { size }).await
    }

    pub async fn host(&self, ip: &str, history: bool, minify: bool) -> ShodanResult<Host> {
        self.run(Operation::Host {
            ip: ip.to_owned(),
            history,
            minify,
        })
        .await
    }

    /// Costs no query credits.
    pub async fn host_count(&self, query: &str, facets: Option<&str>) -> ShodanResult<FacetReport> {
        self.run(Operation::HostCount {
            query: query.to_owned(),
            facets: facets.map(str::to_owned),
        })
        .await
    }

    /// Pages past the first, or any filtered query, cost query credits.
    pub async fn host_search(
        &self,
        query: &str,
        facets: Option<&str>,
        page: Option<u32>,
    ) -> ShodanResult<HostReport> {
        self.run(Operation::HostSearch {
            query: query.to_owned(),
            facets: facets.map(str::to_owned),
            page,
        })
        .await
    }

    pub async fn account_profile(&self) -> ShodanResult<Account> {
        self.run(Operation::AccountProfile).await
    }

    pub async fn api_info(&self) -> ShodanResult<ApiStatus> {
        self.run(Operation::ApiInfo).await
    }

    pub async fn my_ip(&self) -> ShodanResult<ExternalIp> {
        self.run(Operation::MyIp).await
    }

    pub async fn http_headers(&self) -> ShodanResult<HttpHeaders> {
        self.run(Operation::HttpHeaders).await
    }

    pub async fn honeyscore(&self, ip: &str) -> ShodanResult<HoneyScore> {
        self.run(Operation::HoneyScore { ip: ip.to_owned() }).await
    }
}
