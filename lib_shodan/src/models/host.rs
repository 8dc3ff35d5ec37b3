//! # Host
//!
//! An address plus everything the service aggregated about it, including the
//! banners observed on it. A `Host` owns its banners; they are decoded with
//! it and dropped with it.
//!
//! `HostWire` is the wire mapping table for this record: it mirrors the
//! payload field for field, and `Host` is built from it after the identity
//! checks pass.

use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

use super::banner::Banner;
use crate::decode::lenient;

/// Result of a host lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "HostWire", into = "HostWire")]
pub struct Host {
    pub ip: IpAddr,
    pub latitude: f64,
    pub longitude: f64,
    /// The `ports` array exactly as the service sent it (order and duplicates kept).
    pub reported_ports: Vec<u16>,
    pub hostnames: Vec<String>,
    pub tags: Vec<String>,
    pub vulnerabilities: Vec<String>,
    pub region_code: String,
    pub area_code: String,
    pub postal_code: String,
    pub dma_code: String,
    pub country_code: String,
    pub country_code3: String,
    pub country_name: String,
    pub city: String,
    pub organization: String,
    pub asn: String,
    pub isp: String,
    pub os: String,
    pub last_update: String,
    pub banners: Vec<Banner>,
}

impl Host {
    /// Distinct open ports across the host's banners. A host without banners
    /// has no ports here; the raw array stays in [`Host::reported_ports`].
    pub fn ports(&self) -> BTreeSet<u16> {
        self.banners.iter().map(|banner| banner.port).collect()
    }

    /// Numeric form of an IPv4 address.
    pub fn ip_numeric(&self) -> Option<u32> {
        match self.ip {
            IpAddr::V4(v4) => Some(u32::from(v4)),
            IpAddr::V6(_) => None,
        }
    }

    /// Parses [`Host::last_update`].
    pub fn parsed_last_update(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        super::banner::parse_service_timestamp(&self.last_update)
    }
}

/// Wire shape of a host payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct HostWire {
    #[serde(default, deserialize_with = "lenient::opt_u64", skip_serializing_if = "Option::is_none")]
    ip: Option<u64>,
    #[serde(default, deserialize_with = "lenient::string")]
    ip_str: String,
    #[serde(default, deserialize_with = "lenient::f64_or_zero")]
    latitude: f64,
    #[serde(default, deserialize_with = "lenient::f64_or_zero")]
    longitude: f64,
    #[serde(default, deserialize_with = "lenient::port_list")]
    ports: Vec<u16>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    hostnames: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    tags: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    vulns: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    region_code: String,
    #[serde(default, deserialize_with = "lenient::string")]
    area_code: String,
    #[serde(default, deserialize_with = "lenient::string")]
    postal_code: String,
    #[serde(default, deserialize_with = "lenient::string")]
    dma_code: String,
    #[serde(default, deserialize_with = "lenient::string")]
    country_code: String,
    #[serde(default, deserialize_with = "lenient::string")]
    country_code3: String,
    #[serde(default, deserialize_with = "lenient::string")]
    country_name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    city: String,
    #[serde(default, deserialize_with = "lenient::string")]
    org: String,
    #[serde(default, deserialize_with = "lenient::string")]
    asn: String,
    #[serde(default, deserialize_with = "lenient::string")]
    isp: String,
    #[serde(default, deserialize_with = "lenient::string")]
    os: String,
    #[serde(default, deserialize_with = "lenient::string")]
    last_update: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    data: Vec<Banner>,
}

fn resolve_identity(numeric: Option<u64>, text: &str) -> Result<IpAddr, String> {
    let text = text.trim();
    let parsed = if text.is_empty() {
        None
    } else {
        Some(
            text.parse::<IpAddr>()
                .map_err(|_| format!("ip_str '{text}' is not an IP address"))?,
        )
    };

    match (numeric, parsed) {
        (None, None) => Err("host carries neither ip nor ip_str".to_string()),
        (Some(n), None) => u32::try_from(n)
            .map(|n| IpAddr::V4(Ipv4Addr::from(n)))
            .map_err(|_| format!("numeric ip {n} needs ip_str to be interpreted")),
        (None, Some(addr)) => Ok(addr),
        (Some(n), Some(IpAddr::V4(v4))) if u64::from(u32::from(v4)) != n => Err(format!(
            "numeric ip {n} does not match ip_str '{v4}'"
        )),
        // IPv6 numeric forms overflow JSON numbers; the string form is authoritative.
        (Some(_), Some(addr)) => Ok(addr),
    }
}

impl TryFrom<HostWire> for Host {
    type Error = String;

    fn try_from(wire: HostWire) -> Result<Self, Self::Error> {
        let ip = resolve_identity(wire.ip, &wire.ip_str)?;
        Ok(Self {
            ip,
            latitude: wire.latitude,
            longitude: wire.longitude,
            reported_ports: wire.ports,
            hostnames: wire.hostnames,
            tags: wire.tags,
            vulnerabilities: wire.vulns,
            region_code: wire.region_code,
            area_code: wire.area_code,
            postal_code: wire.postal_code,
            dma_code: wire.dma_code,
            country_code: wire.country_code,
            country_code3: wire.country_code3,
            country_name: wire.country_name,
            city: wire.city,
            organization: wire.org,
            asn: wire.asn,
            isp: wire.isp,
            os: wire.os,
            last_update: wire.last_update,
            banners: wire.data,
        })
    }
}

impl From<Host> for HostWire {
    fn from(host: Host) -> Self {
        let ip = host.ip_numeric().map(u64::from);
        Self {
            ip,
            ip_str: host.ip.to_string(),
            latitude: host.latitude,
            longitude: host.longitude,
            ports: host.reported_ports,
            hostnames: host.hostnames,
            tags: host.tags,
            vulns: host.vulnerabilities,
            region_code: host.region_code,
            area_code: host.area_code,
            postal_code: host.postal_code,
            dma_code: host.dma_code,
            country_code: host.country_code,
            country_code3: host.country_code3,
            country_name: host.country_name,
            city: host.city,
            org: host.organization,
            asn: host.asn,
            isp: host.isp,
            os: host.os,
            last_update: host.last_update,
            data: host.banners,
        }
    }
}
