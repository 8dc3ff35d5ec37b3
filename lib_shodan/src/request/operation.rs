//! # Operations
//!
//! Typed descriptors for every call the client can make. An [`Operation`] is a
//! one-shot call answered by a single JSON document; a [`StreamTarget`] names
//! one of the long-lived banner streams.

use std::fmt;
use std::str::FromStr;

use crate::decode::RecordKind;
use crate::error::ShodanError;

/// Sort field for the saved-query listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortKey {
    Votes,
    Timestamp,
}

impl SortKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Votes => "votes",
            Self::Timestamp => "timestamp",
        }
    }
}

impl FromStr for SortKey {
    type Err = ShodanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "votes" => Ok(Self::Votes),
            "timestamp" => Ok(Self::Timestamp),
            other => Err(ShodanError::invalid(
                "sort",
                format!("'{other}' is not one of: votes, timestamp"),
            )),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = ShodanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(ShodanError::invalid(
                "order",
                format!("'{other}' is not one of: asc, desc"),
            )),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Paging and sorting for the saved-query listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct QueryListParams {
    pub page: Option<u32>,
    pub sort: Option<SortKey>,
    pub order: Option<SortOrder>,
}

impl QueryListParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn sort(mut self, sort: SortKey) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = Some(order);
        self
    }
}

/// A one-shot call and its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Protocols the crawlers can scan with.
    Protocols,
    /// Hostnames pointing at each address.
    ReverseDns { ips: Vec<String> },
    /// Addresses each hostname resolves to.
    ResolveDns { hostnames: Vec<String> },
    /// Ports the crawlers are looking at.
    CrawledPorts,
    /// How the service parses a search query.
    QueryTokens { query: String },
    SavedQueries(QueryListParams),
    SearchQueries { query: String, page: Option<u32> },
    QueryTags { size: Option<u32> },
    /// Everything known about one address.
    Host {
        ip: String,
        history: bool,
        minify: bool,
    },
    /// Result count and facets of a search, without matches. Costs no credits.
    HostCount {
        query: String,
        facets: Option<String>,
    },
    /// Full search. Pages past the first cost query credits.
    HostSearch {
        query: String,
        facets: Option<String>,
        page: Option<u32>,
    },
    AccountProfile,
    ApiInfo,
    MyIp,
    HttpHeaders,
    HoneyScore { ip: String },
}

impl Operation {
    /// Path relative to the API base, with `{..}` path parameters.
    pub fn path_template(&self) -> &'static str {
        match self {
            Self::Protocols => "shodan/protocols",
            Self::ReverseDns { .. } => "dns/reverse",
            Self::ResolveDns { .. } => "dns/resolve",
            Self::CrawledPorts => "shodan/ports",
            Self::QueryTokens { .. } => "shodan/host/search/tokens",
            Self::SavedQueries(_) => "shodan/query",
            Self::SearchQueries { .. } => "shodan/query/search",
            Self::QueryTags { .. } => "shodan/query/tags",
            Self::Host { .. } => "shodan/host/{ip}",
            Self::HostCount { .. } => "shodan/host/count",
            Self::HostSearch { .. } => "shodan/host/search",
            Self::AccountProfile => "account/profile",
            Self::ApiInfo => "api-info",
            Self::MyIp => "tools/myip",
            Self::HttpHeaders => "tools/httpheaders",
            Self::HoneyScore { .. } => "labs/honeyscore/{ip}",
        }
    }

    /// Record kind the answer decodes to.
    pub fn record_kind(&self) -> RecordKind {
        match self {
            Self::Protocols => RecordKind::Protocols,
            Self::ReverseDns { .. } => RecordKind::DnsHostnames,
            Self::ResolveDns { .. } => RecordKind::DnsIps,
            Self::CrawledPorts => RecordKind::Ports,
            Self::QueryTokens { .. } => RecordKind::TokenReport,
            Self::SavedQueries(_) | Self::SearchQueries { .. } => RecordKind::QueryReport,
            Self::QueryTags { .. } => RecordKind::TagReport,
            Self::Host { .. } => RecordKind::Host,
            Self::HostCount { .. } => RecordKind::FacetReport,
            Self::HostSearch { .. } => RecordKind::HostReport,
            Self::AccountProfile => RecordKind::Account,
            Self::ApiInfo => RecordKind::ApiStatus,
            Self::MyIp => RecordKind::ExternalIp,
            Self::HttpHeaders => RecordKind::HttpHeaders,
            Self::HoneyScore { .. } => RecordKind::HoneyScore,
        }
    }
}

/// One of the streaming endpoints. Every stream yields banners.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StreamTarget {
    /// Banners for every network alert on the account.
    Alerts,
    Alert { id: String },
    /// Everything the crawlers collect. Needs a data license.
    Firehose,
    Asn(Vec<String>),
    /// Two-letter country codes.
    Countries(Vec<String>),
    Ports(Vec<u16>),
}

impl StreamTarget {
    pub fn path_template(&self) -> &'static str {
        match self {
            Self::Alerts => "shodan/alert",
            Self::Alert { .. } => "shodan/alert/{id}",
            Self::Firehose => "shodan/banners",
            Self::Asn(_) => "shodan/asn/{asn}",
            Self::Countries(_) => "shodan/countries/{countries}",
            Self::Ports(_) => "shodan/ports/{ports}",
        }
    }
}
