//! # Banner
//!
//! One observed service exposure: what answered on a given port of a given
//! address, and when. Banners arrive on their own from the streaming API and
//! nested inside [`Host`](super::Host) lookups and search results.
//!
//! The serde attributes on these structs are the wire mapping table: the
//! `rename` on a field is the name the service uses for it.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decode::lenient;

/// Crawler metadata the service attaches under `_shodan`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlerInfo {
    /// Protocol module that grabbed the banner (e.g. `http`, `ssh`).
    #[serde(default, deserialize_with = "lenient::string")]
    pub module: String,
    /// Unique identifier of the banner.
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    /// Crawler that collected the banner.
    #[serde(default, deserialize_with = "lenient::string")]
    pub crawler: String,
}

/// Geographic information attached to a banner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, deserialize_with = "lenient::string")]
    pub city: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub region_code: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub area_code: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub postal_code: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub dma_code: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub country_code: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub country_code3: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub country_name: String,
    #[serde(default, deserialize_with = "lenient::f64_or_zero")]
    pub latitude: f64,
    #[serde(default, deserialize_with = "lenient::f64_or_zero")]
    pub longitude: f64,
}

/// A single service banner. `port` and `timestamp` are required; every other
/// field falls back to its empty value when absent or `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Banner {
    #[serde(deserialize_with = "lenient::port")]
    pub port: u16,
    /// Collection time as sent by the service, e.g. `2020-01-01T00:00:00.000000`.
    pub timestamp: String,
    /// Transport protocol (`tcp` / `udp`).
    #[serde(rename = "transport", default, deserialize_with = "lenient::string")]
    pub protocol: String,
    #[serde(
        rename = "ip",
        default,
        deserialize_with = "lenient::opt_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub ip_numeric: Option<u64>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub ip_str: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub product: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub version: String,
    /// Raw banner payload.
    #[serde(default, deserialize_with = "lenient::string")]
    pub data: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub hostnames: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub domains: Vec<String>,
    #[serde(rename = "org", default, deserialize_with = "lenient::string")]
    pub organization: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub isp: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub asn: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub os: String,
    #[serde(default, deserialize_with = "lenient::i64_or_zero")]
    pub hash: i64,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub cpe: Vec<String>,
    #[serde(rename = "vulns", default, deserialize_with = "lenient::string_list")]
    pub vulnerabilities: Vec<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub location: Location,
    #[serde(rename = "_shodan", default, deserialize_with = "lenient::or_default")]
    pub crawler: CrawlerInfo,
}

impl Banner {
    /// Protocol module that produced this banner (e.g. `http`).
    pub fn module(&self) -> &str {
        &self.crawler.module
    }

    /// Parses [`Banner::timestamp`]. The service omits the zone; it is UTC.
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        parse_service_timestamp(&self.timestamp)
    }
}

/// Parses the timestamp formats the service emits (with or without fractional
/// seconds, with or without an explicit offset).
pub fn parse_service_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_timestamps_parse_as_utc() {
        let parsed = parse_service_timestamp("2020-01-01T00:00:00.000000").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2020-01-01T00:00:00+00:00");
        assert!(parse_service_timestamp("2017-06-22 10:11:12.123").is_some());
        assert!(parse_service_timestamp("2021-03-04T05:06:07Z").is_some());
        assert!(parse_service_timestamp("yesterday").is_none());
    }
}
