//! # Request Builder
//!
//! Pure construction of [`RequestSpec`] values. Every parameter is validated
//! here, before any network call: a bad value is an
//! [`InvalidParameter`](ShodanError::InvalidParameter) error and nothing is sent.
//!
//! Path parameters are substituted into the operation's template. All other
//! parameters become query parameters in a fixed order, and the API key is
//! always appended last. The same inputs always produce the same spec.

use std::fmt;
use std::net::IpAddr;

use super::operation::{Operation, StreamTarget};
use super::spec::{expand_template, HttpMethod, RequestSpec, KEY_PARAM};
use crate::error::{ShodanError, ShodanResult};

/// Builds request specs for one API key.
#[derive(Clone)]
pub struct RequestBuilder {
    api_key: String,
}

impl fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("api_key", &"***")
            .finish()
    }
}

/// Ordered query parameters; the key is added by `finish`.
#[derive(Default)]
struct QueryPairs(Vec<(String, String)>);

impl QueryPairs {
    fn push(&mut self, name: &str, value: impl Into<String>) {
        self.0.push((name.to_owned(), value.into()));
    }

    fn push_opt(&mut self, name: &str, value: Option<impl Into<String>>) {
        if let Some(value) = value {
            self.push(name, value);
        }
    }

    fn flag(&mut self, name: &str, enabled: bool) {
        if enabled {
            self.push(name, "true");
        }
    }

    fn finish(mut self, api_key: &str) -> Vec<(String, String)> {
        self.push(KEY_PARAM, api_key);
        self.0
    }
}

impl RequestBuilder {
    /// Fails when the key is blank.
    pub fn new(api_key: impl Into<String>) -> ShodanResult<Self> {
        let api_key = api_key.into().trim().to_owned();
        if api_key.is_empty() {
            return Err(ShodanError::invalid(KEY_PARAM, "API key is empty"));
        }
        Ok(Self { api_key })
    }

    /// Builds the request for a one-shot call.
    pub fn build(&self, operation: &Operation) -> ShodanResult<RequestSpec> {
        let template = operation.path_template();
        let mut query = QueryPairs::default();

        let path = match operation {
            Operation::Protocols
            | Operation::CrawledPorts
            | Operation::AccountProfile
            | Operation::ApiInfo
            | Operation::MyIp
            | Operation::HttpHeaders => template.to_owned(),
            Operation::ReverseDns { ips } => {
                for ip in ips {
                    ip_address("ips", ip)?;
                }
                query.push("ips", id_list("ips", ips)?);
                template.to_owned()
            }
            Operation::ResolveDns { hostnames } => {
                query.push("hostnames", id_list("hostnames", hostnames)?);
                template.to_owned()
            }
            Operation::QueryTokens { query: text } => {
                query.push("query", required("query", text)?);
                template.to_owned()
            }
            Operation::SavedQueries(params) => {
                query.push_opt("page", page(params.page)?);
                query.push_opt("sort", params.sort.map(|sort| sort.as_str()));
                query.push_opt("order", params.order.map(|order| order.as_str()));
                template.to_owned()
            }
            Operation::SearchQueries { query: text, page: p } => {
                query.push("query", required("query", text)?);
                query.push_opt("page", page(*p)?);
                template.to_owned()
            }
            Operation::QueryTags { size } => {
                if *size == Some(0) {
                    return Err(ShodanError::invalid("size", "must be at least 1"));
                }
                query.push_opt("size", size.map(|size| size.to_string()));
                template.to_owned()
            }
            Operation::Host { ip, history, minify } => {
                let ip = ip_address("ip", ip)?;
                query.flag("history", *history);
                query.flag("minify", *minify);
                expand_template(template, &[("ip", ip.as_str())])
            }
            Operation::HostCount { query: text, facets } => {
                query.push("query", required("query", text)?);
                query.push_opt("facets", optional(facets));
                template.to_owned()
            }
            Operation::HostSearch {
                query: text,
                facets,
                page: p,
            } => {
                query.push("query", required("query", text)?);
                query.push_opt("facets", optional(facets));
                query.push_opt("page", page(*p)?);
                template.to_owned()
            }
            Operation::HoneyScore { ip } => {
                let ip = ip_address("ip", ip)?;
                expand_template(template, &[("ip", ip.as_str())])
            }
        };

        Ok(RequestSpec::new(
            HttpMethod::Get,
            path,
            query.finish(&self.api_key),
        ))
    }

    /// Builds the request for a streaming subscription.
    pub fn build_stream(&self, target: &StreamTarget) -> ShodanResult<RequestSpec> {
        let template = target.path_template();
        let path = match target {
            StreamTarget::Alerts | StreamTarget::Firehose => template.to_owned(),
            StreamTarget::Alert { id } => {
                let id = path_segment("id", id)?;
                expand_template(template, &[("id", id)])
            }
            StreamTarget::Asn(asns) => {
                let asns = id_list("asn", asns)?;
                expand_template(template, &[("asn", asns.as_str())])
            }
            StreamTarget::Countries(countries) => {
                let codes = countries
                    .iter()
                    .map(|code| country_code(code))
                    .collect::<ShodanResult<Vec<_>>>()?;
                let codes = id_list("countries", &codes)?;
                expand_template(template, &[("countries", codes.as_str())])
            }
            StreamTarget::Ports(ports) => {
                if ports.is_empty() {
                    return Err(ShodanError::invalid("ports", "at least one port is required"));
                }
                let ports = ports
                    .iter()
                    .map(u16::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                expand_template(template, &[("ports", ports.as_str())])
            }
        };

        Ok(RequestSpec::new(
            HttpMethod::Get,
            path,
            QueryPairs::default().finish(&self.api_key),
        ))
    }
}

fn required<'a>(name: &str, value: &'a str) -> ShodanResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        Err(ShodanError::invalid(name, "is required"))
    } else {
        Ok(value)
    }
}

/// Blank optional strings count as absent.
fn optional(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn page(page: Option<u32>) -> ShodanResult<Option<String>> {
    match page {
        Some(0) => Err(ShodanError::invalid("page", "pages start at 1")),
        other => Ok(other.map(|p| p.to_string())),
    }
}

fn path_segment<'a>(name: &str, value: &'a str) -> ShodanResult<&'a str> {
    let value = required(name, value)?;
    if value
        .chars()
        .any(|c| matches!(c, '/' | '?' | '#') || c.is_whitespace())
    {
        return Err(ShodanError::invalid(
            name,
            format!("'{value}' is not a valid path segment"),
        ));
    }
    Ok(value)
}

/// Comma-joined list; every element must be a non-empty path-safe token.
fn id_list<S: AsRef<str>>(name: &str, items: &[S]) -> ShodanResult<String> {
    if items.is_empty() {
        return Err(ShodanError::invalid(name, "at least one value is required"));
    }
    let parts = items
        .iter()
        .map(|item| path_segment(name, item.as_ref()))
        .collect::<ShodanResult<Vec<_>>>()?;
    if let Some(bad) = parts.iter().find(|part| part.contains(',')) {
        return Err(ShodanError::invalid(name, format!("'{bad}' contains a comma")));
    }
    Ok(parts.join(","))
}

fn ip_address(name: &str, value: &str) -> ShodanResult<String> {
    let value = required(name, value)?;
    value
        .parse::<IpAddr>()
        .map(|ip| ip.to_string())
        .map_err(|_| ShodanError::invalid(name, format!("'{value}' is not an IP address")))
}

fn country_code(value: &str) -> ShodanResult<String> {
    let code = value.trim();
    if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code.to_ascii_uppercase())
    } else {
        Err(ShodanError::invalid(
            "countries",
            format!("'{value}' is not a two-letter country code"),
        ))
    }
}
