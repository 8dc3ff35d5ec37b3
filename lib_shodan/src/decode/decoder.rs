//! # Record Decoder
//!
//! Turns one JSON value into one typed record. Decoding is pure: no I/O, no
//! shared state, safe to call from any number of subscriptions at once.
//!
//! A failure is always scoped to the single value being decoded and is
//! reported as [`ShodanError::MalformedRecord`], so a stream can skip the line
//! and carry on.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::lenient;
use crate::error::{ShodanError, ShodanResult};
use crate::models::{account, dns};
use crate::models::{
    Account, ApiStatus, Banner, DnsHostname, DnsIp, ExternalIp, FacetReport, HoneyScore, Host,
    HostReport, HttpHeaders, Protocol, QueryReport, TagReport, TokenReport,
};

/// The record kinds the service returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Host,
    Banner,
    DnsHostnames,
    DnsIps,
    QueryReport,
    TagReport,
    FacetReport,
    HostReport,
    TokenReport,
    Account,
    ApiStatus,
    Protocols,
    Ports,
    HttpHeaders,
    ExternalIp,
    HoneyScore,
}

impl RecordKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Banner => "banner",
            Self::DnsHostnames => "dns_hostnames",
            Self::DnsIps => "dns_ips",
            Self::QueryReport => "query_report",
            Self::TagReport => "tag_report",
            Self::FacetReport => "facet_report",
            Self::HostReport => "host_report",
            Self::TokenReport => "token_report",
            Self::Account => "account",
            Self::ApiStatus => "api_status",
            Self::Protocols => "protocols",
            Self::Ports => "ports",
            Self::HttpHeaders => "http_headers",
            Self::ExternalIp => "external_ip",
            Self::HoneyScore => "honeyscore",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any decoded document. Serializes as the bare record, without a tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Host(Host),
    Banner(Banner),
    #[serde(serialize_with = "dns::hostnames_to_wire")]
    DnsHostnames(Vec<DnsHostname>),
    #[serde(serialize_with = "dns::ips_to_wire")]
    DnsIps(Vec<DnsIp>),
    QueryReport(QueryReport),
    TagReport(TagReport),
    FacetReport(FacetReport),
    HostReport(HostReport),
    TokenReport(TokenReport),
    Account(Account),
    ApiStatus(ApiStatus),
    #[serde(serialize_with = "account::protocols_to_wire")]
    Protocols(Vec<Protocol>),
    Ports(Vec<u16>),
    HttpHeaders(HttpHeaders),
    ExternalIp(ExternalIp),
    HoneyScore(HoneyScore),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Host(_) => RecordKind::Host,
            Self::Banner(_) => RecordKind::Banner,
            Self::DnsHostnames(_) => RecordKind::DnsHostnames,
            Self::DnsIps(_) => RecordKind::DnsIps,
            Self::QueryReport(_) => RecordKind::QueryReport,
            Self::TagReport(_) => RecordKind::TagReport,
            Self::FacetReport(_) => RecordKind::FacetReport,
            Self::HostReport(_) => RecordKind::HostReport,
            Self::TokenReport(_) => RecordKind::TokenReport,
            Self::Account(_) => RecordKind::Account,
            Self::ApiStatus(_) => RecordKind::ApiStatus,
            Self::Protocols(_) => RecordKind::Protocols,
            Self::Ports(_) => RecordKind::Ports,
            Self::HttpHeaders(_) => RecordKind::HttpHeaders,
            Self::ExternalIp(_) => RecordKind::ExternalIp,
            Self::HoneyScore(_) => RecordKind::HoneyScore,
        }
    }
}

/// A typed record that can be decoded from one wire value.
pub trait WireRecord: Sized {
    const KIND: RecordKind;

    fn from_wire(value: &Value) -> ShodanResult<Self>;

    fn into_record(self) -> Record;
}

fn via_serde<T: DeserializeOwned>(kind: RecordKind, value: &Value) -> ShodanResult<T> {
    T::deserialize(value).map_err(|err| ShodanError::malformed(kind.as_str(), err.to_string()))
}

fn via_fn<T>(
    kind: RecordKind,
    value: &Value,
    decode: impl FnOnce(&Value) -> Result<T, String>,
) -> ShodanResult<T> {
    decode(value).map_err(|reason| ShodanError::malformed(kind.as_str(), reason))
}

macro_rules! serde_record {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl WireRecord for $ty {
                const KIND: RecordKind = RecordKind::$variant;

                fn from_wire(value: &Value) -> ShodanResult<Self> {
                    via_serde(Self::KIND, value)
                }

                fn into_record(self) -> Record {
                    Record::$variant(self)
                }
            }
        )*
    };
}

serde_record! {
    Host => Host,
    Banner => Banner,
    QueryReport => QueryReport,
    TagReport => TagReport,
    FacetReport => FacetReport,
    HostReport => HostReport,
    TokenReport => TokenReport,
    Account => Account,
    ApiStatus => ApiStatus,
}

impl WireRecord for Vec<DnsHostname> {
    const KIND: RecordKind = RecordKind::DnsHostnames;

    fn from_wire(value: &Value) -> ShodanResult<Self> {
        via_fn(Self::KIND, value, |v| {
            crate::models::dns::keyed_lists(v).map(DnsHostname::from_pairs)
        })
    }

    fn into_record(self) -> Record {
        Record::DnsHostnames(self)
    }
}

impl WireRecord for Vec<DnsIp> {
    const KIND: RecordKind = RecordKind::DnsIps;

    fn from_wire(value: &Value) -> ShodanResult<Self> {
        via_fn(Self::KIND, value, |v| {
            crate::models::dns::keyed_lists(v).map(DnsIp::from_pairs)
        })
    }

    fn into_record(self) -> Record {
        Record::DnsIps(self)
    }
}

impl WireRecord for Vec<Protocol> {
    const KIND: RecordKind = RecordKind::Protocols;

    fn from_wire(value: &Value) -> ShodanResult<Self> {
        via_fn(Self::KIND, value, Protocol::list_from_wire)
    }

    fn into_record(self) -> Record {
        Record::Protocols(self)
    }
}

impl WireRecord for Vec<u16> {
    const KIND: RecordKind = RecordKind::Ports;

    fn from_wire(value: &Value) -> ShodanResult<Self> {
        via_fn(Self::KIND, value, |v| {
            let items = v
                .as_array()
                .ok_or_else(|| "expected an array of ports".to_string())?;
            items
                .iter()
                .filter_map(|item| lenient::integer(item).transpose())
                .map(|port| {
                    port.and_then(|n| {
                        u16::try_from(n).map_err(|_| format!("port {n} is out of range"))
                    })
                })
                .collect()
        })
    }

    fn into_record(self) -> Record {
        Record::Ports(self)
    }
}

impl WireRecord for HttpHeaders {
    const KIND: RecordKind = RecordKind::HttpHeaders;

    fn from_wire(value: &Value) -> ShodanResult<Self> {
        via_fn(Self::KIND, value, HttpHeaders::from_wire)
    }

    fn into_record(self) -> Record {
        Record::HttpHeaders(self)
    }
}

impl WireRecord for ExternalIp {
    const KIND: RecordKind = RecordKind::ExternalIp;

    fn from_wire(value: &Value) -> ShodanResult<Self> {
        via_fn(Self::KIND, value, |v| match v {
            Value::String(ip) if !ip.trim().is_empty() => Ok(ExternalIp(ip.trim().to_owned())),
            _ => Err("expected the address as a non-empty string".to_string()),
        })
    }

    fn into_record(self) -> Record {
        Record::ExternalIp(self)
    }
}

impl WireRecord for HoneyScore {
    const KIND: RecordKind = RecordKind::HoneyScore;

    fn from_wire(value: &Value) -> ShodanResult<Self> {
        via_fn(Self::KIND, value, HoneyScore::from_wire)
    }

    fn into_record(self) -> Record {
        Record::HoneyScore(self)
    }
}

/// Decodes `value` as `T`.
pub fn decode_as<T: WireRecord>(value: &Value) -> ShodanResult<T> {
    T::from_wire(value)
}

/// Decodes `value` as the given kind.
pub fn decode(kind: RecordKind, value: &Value) -> ShodanResult<Record> {
    fn typed<T: WireRecord>(value: &Value) -> ShodanResult<Record> {
        T::from_wire(value).map(WireRecord::into_record)
    }

    match kind {
        RecordKind::Host => typed::<Host>(value),
        RecordKind::Banner => typed::<Banner>(value),
        RecordKind::DnsHostnames => typed::<Vec<DnsHostname>>(value),
        RecordKind::DnsIps => typed::<Vec<DnsIp>>(value),
        RecordKind::QueryReport => typed::<QueryReport>(value),
        RecordKind::TagReport => typed::<TagReport>(value),
        RecordKind::FacetReport => typed::<FacetReport>(value),
        RecordKind::HostReport => typed::<HostReport>(value),
        RecordKind::TokenReport => typed::<TokenReport>(value),
        RecordKind::Account => typed::<Account>(value),
        RecordKind::ApiStatus => typed::<ApiStatus>(value),
        RecordKind::Protocols => typed::<Vec<Protocol>>(value),
        RecordKind::Ports => typed::<Vec<u16>>(value),
        RecordKind::HttpHeaders => typed::<HttpHeaders>(value),
        RecordKind::ExternalIp => typed::<ExternalIp>(value),
        RecordKind::HoneyScore => typed::<HoneyScore>(value),
    }
}

/// Parses a full response body and decodes it as `T`.
pub fn decode_body<T: WireRecord>(body: &[u8]) -> ShodanResult<T> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|err| ShodanError::malformed(T::KIND.as_str(), format!("invalid JSON: {err}")))?;
    T::from_wire(&value)
}

/// Decodes one NDJSON line (terminator already stripped) into a banner.
pub fn decode_line(line: &[u8]) -> ShodanResult<Banner> {
    decode_body::<Banner>(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn minimal_banner_fills_defaults() {
        let banner =
            decode_line(br#"{"port":80,"timestamp":"2020-01-01T00:00:00.000000"}"#).unwrap();
        assert_eq!(banner.port, 80);
        assert_eq!(banner.protocol, "");
        assert!(banner.hostnames.is_empty());
        assert_eq!(banner.ip_numeric, None);
        assert_eq!(banner.location.latitude, 0.0);
    }

    #[test]
    fn banner_requires_port_and_timestamp() {
        for line in [
            &br#"{"timestamp":"2020-01-01T00:00:00"}"#[..],
            br#"{"port":80}"#,
            br#"{"port":"http","timestamp":"x"}"#,
            br#"{"port":70000,"timestamp":"x"}"#,
            br#"[1,2,3]"#,
            br#"{"port":80,"timestamp""#,
        ] {
            let err = decode_line(line).unwrap_err();
            assert!(
                matches!(err, ShodanError::MalformedRecord { kind: "banner", .. }),
                "{err:?}"
            );
        }
    }

    #[test]
    fn banner_maps_wire_names_and_quirks() {
        let banner = decode_as::<Banner>(&json!({
            "port": "443",
            "timestamp": "2021-06-01T10:00:00.123456",
            "transport": "tcp",
            "ip": "134744072",
            "ip_str": "8.8.8.8",
            "org": "Google LLC",
            "hostnames": ["dns.google", "dns.google"],
            "vulns": {"CVE-2014-0160": {"verified": true}},
            "hash": -553166942,
            "location": {"country_code": "US", "latitude": "37.751", "longitude": null},
            "_shodan": {"module": "https", "id": "abc"}
        }))
        .unwrap();
        assert_eq!(banner.port, 443);
        assert_eq!(banner.protocol, "tcp");
        assert_eq!(banner.ip_numeric, Some(134744072));
        assert_eq!(banner.organization, "Google LLC");
        assert_eq!(banner.hostnames, vec!["dns.google", "dns.google"]);
        assert_eq!(banner.vulnerabilities, vec!["CVE-2014-0160"]);
        assert_eq!(banner.hash, -553166942);
        assert_eq!(banner.location.country_code, "US");
        assert_eq!(banner.location.latitude, 37.751);
        assert_eq!(banner.module(), "https");
    }

    #[test]
    fn default_filling_is_idempotent() {
        let first = decode_as::<Banner>(&json!({"port": 22, "timestamp": "t", "data": null}))
            .unwrap();
        let reencoded = serde_json::to_value(&first).unwrap();
        let second = decode_as::<Banner>(&reencoded).unwrap();
        assert_eq!(first, second);

        let host = decode_as::<Host>(&json!({"ip_str": "1.1.1.1"})).unwrap();
        let again = decode_as::<Host>(&serde_json::to_value(&host).unwrap()).unwrap();
        assert_eq!(host, again);
    }

    #[test]
    fn every_record_kind_reencodes_to_its_wire_shape() {
        let samples = [
            (
                RecordKind::Host,
                json!({"ip_str": "8.8.8.8", "ports": [53], "data": [{"port": 53, "timestamp": "t"}]}),
            ),
            (RecordKind::Banner, json!({"port": 22, "timestamp": "t", "hostnames": ["a"]})),
            (
                RecordKind::DnsHostnames,
                json!({"8.8.8.8": ["dns.google"], "10.0.0.1": null}),
            ),
            (
                RecordKind::DnsIps,
                json!({"google.com": "142.250.74.46", "nope.invalid": null}),
            ),
            (
                RecordKind::QueryReport,
                json!({"total": 1, "matches": [{"title": "t", "query": "q", "votes": 2, "tags": ["x"]}]}),
            ),
            (
                RecordKind::TagReport,
                json!({"total": 1, "matches": [{"value": "ics", "count": 3}]}),
            ),
            (
                RecordKind::FacetReport,
                json!({"total": 5, "facets": {"port": [{"value": 80, "count": 5}]}}),
            ),
            (
                RecordKind::HostReport,
                json!({"total": 1, "matches": [{"port": 80, "timestamp": "t"}], "facets": {}}),
            ),
            (
                RecordKind::TokenReport,
                json!({"string": "apache", "filters": ["port"], "errors": [], "attributes": {"ports": [80]}}),
            ),
            (
                RecordKind::Account,
                json!({"member": true, "credits": 3, "display_name": "me", "created": "2020"}),
            ),
            (
                RecordKind::ApiStatus,
                json!({"plan": "dev", "query_credits": 10, "usage_limits": {"scan_credits": 5}}),
            ),
            (
                RecordKind::Protocols,
                json!({"zookeeper": "Zookeeper status", "http": "HTTP banner"}),
            ),
            (RecordKind::Ports, json!([22, 80, 443])),
            (
                RecordKind::HttpHeaders,
                json!({"Host": "api.shodan.io", "Accept": "*/*"}),
            ),
            (RecordKind::ExternalIp, json!("203.0.113.7")),
            (RecordKind::HoneyScore, json!(0.25)),
        ];
        assert_eq!(samples.len(), 16);

        for (kind, wire) in samples {
            let record = decode(kind, &wire).unwrap();
            assert_eq!(record.kind(), kind);
            let reencoded = serde_json::to_value(&record).unwrap();
            let again = decode(kind, &reencoded)
                .unwrap_or_else(|err| panic!("{kind} did not decode its own output: {err}"));
            assert_eq!(record, again, "{kind}");
        }
    }

    #[test]
    fn keyed_records_serialize_as_objects_in_wire_order() {
        let reverse = decode(RecordKind::DnsHostnames, &json!({"8.8.8.8": ["dns.google"]})).unwrap();
        assert_eq!(
            serde_json::to_value(&reverse).unwrap(),
            json!({"8.8.8.8": ["dns.google"]})
        );

        let headers = decode_as::<HttpHeaders>(&json!({"B": "2", "A": "1"})).unwrap();
        assert_eq!(
            serde_json::to_string(&headers).unwrap(),
            r#"{"B":"2","A":"1"}"#
        );
    }

    #[test]
    fn host_owns_banners_and_derives_ports() {
        let host = decode_as::<Host>(&json!({
            "ip": 134744072,
            "ip_str": "8.8.8.8",
            "ports": [443, 53, 53],
            "last_update": "2021-06-01T10:00:00.000000",
            "country_code": "US",
            "data": [
                {"port": 53, "timestamp": "a"},
                {"port": 443, "timestamp": "b"},
                {"port": 53, "timestamp": "c", "transport": "udp"}
            ]
        }))
        .unwrap();
        assert_eq!(host.banners.len(), 3);
        assert_eq!(host.reported_ports, vec![443, 53, 53]);
        assert_eq!(host.ports().into_iter().collect::<Vec<_>>(), vec![53, 443]);
        assert_eq!(host.country_code, "US");
        assert!(host.parsed_last_update().is_some());
    }

    #[test]
    fn host_identity_mismatch_is_malformed() {
        let err = decode(RecordKind::Host, &json!({"ip": 1, "ip_str": "8.8.8.8"})).unwrap_err();
        assert!(matches!(err, ShodanError::MalformedRecord { kind: "host", .. }));
    }

    #[test]
    fn dns_entries_are_never_absent() {
        let entries = decode_as::<Vec<DnsHostname>>(&json!({
            "8.8.8.8": ["dns.google"],
            "10.0.0.1": null,
            "1.1.1.1": "one.one.one.one"
        }))
        .unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].ip, "8.8.8.8");
        assert!(entries[1].hostnames.is_empty());
        assert_eq!(entries[2].hostnames, vec!["one.one.one.one"]);

        let resolved = decode_as::<Vec<DnsIp>>(&json!({"google.com": "142.250.0.1"})).unwrap();
        assert_eq!(resolved[0].ips, vec!["142.250.0.1"]);
    }

    #[test]
    fn facets_keep_service_order() {
        let report = decode_as::<FacetReport>(&json!({
            "total": "1200",
            "facets": {
                "port": [{"value": 80, "count": 10}],
                "country": [{"value": "US", "count": 900}, {"value": "DE", "count": 300}]
            }
        }))
        .unwrap();
        assert_eq!(report.total, 1200);
        assert_eq!(report.facets[0].name, "port");
        assert_eq!(report.facets[0].values[0].value, "80");
        let country = report.facet("country").unwrap();
        assert_eq!(country.values[1].value, "DE");
    }

    #[test]
    fn reports_keep_match_order() {
        let report = decode_as::<QueryReport>(&json!({
            "total": 2,
            "matches": [
                {"title": "webcams", "votes": "5", "tags": ["webcam"]},
                {"title": "routers", "votes": 9}
            ]
        }))
        .unwrap();
        assert_eq!(report.matches[0].title, "webcams");
        assert_eq!(report.matches[0].votes, 5);
        assert_eq!(report.matches[1].votes, 9);

        let tokens = decode_as::<TokenReport>(&json!({
            "string": "apache",
            "filters": ["country", "port"],
            "errors": [],
            "attributes": {"ports": [80, "443"]}
        }))
        .unwrap();
        assert_eq!(tokens.total(), 2);
        assert_eq!(tokens.attributes.ports, vec![80, 443]);
    }

    #[test]
    fn small_documents_decode() {
        assert_eq!(
            decode(RecordKind::Ports, &json!([7, "80", 443])).unwrap(),
            Record::Ports(vec![7, 80, 443])
        );
        assert_eq!(
            decode(RecordKind::ExternalIp, &json!("203.0.113.7")).unwrap(),
            Record::ExternalIp(ExternalIp("203.0.113.7".into()))
        );
        assert!(decode(RecordKind::ExternalIp, &json!(12)).is_err());

        let status = decode_as::<ApiStatus>(&json!({
            "plan": "dev",
            "query_credits": 100,
            "unlocked": true,
            "usage_limits": {"query_credits": -1}
        }))
        .unwrap();
        assert!(status.unlocked);
        assert_eq!(status.usage_limits.query_credits, -1);
    }

    #[test]
    fn record_kind_round_trips() {
        let record = decode(RecordKind::HoneyScore, &json!(0.5)).unwrap();
        assert_eq!(record.kind(), RecordKind::HoneyScore);
        assert_eq!(serde_json::to_value(&record).unwrap(), json!(0.5));
    }
}
