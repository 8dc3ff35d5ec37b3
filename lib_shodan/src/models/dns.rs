//! DNS lookup results.
//!
//! Both lookups answer with one object keyed by the queried names. Each key
//! maps to its results; a `null` or missing answer becomes an empty list.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::decode::lenient;

/// Reverse lookup entry: one address and the hostnames pointing at it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsHostname {
    pub ip: String,
    pub hostnames: Vec<String>,
}

/// Forward lookup entry: one hostname and the addresses it resolves to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsIp {
    pub hostname: String,
    pub ips: Vec<String>,
}

/// Splits a `{key: results}` object into ordered pairs.
pub(crate) fn keyed_lists(value: &Value) -> Result<Vec<(String, Vec<String>)>, String> {
    let map = value
        .as_object()
        .ok_or_else(|| "expected an object keyed by the queried names".to_string())?;
    map.iter()
        .map(|(key, results)| {
            lenient::text_list(results)
                .map(|list| (key.clone(), list))
                .map_err(|reason| format!("entry '{key}': {reason}"))
        })
        .collect()
}

/// Writes the entries back as the `{key: results}` object they came from.
fn write_keyed<'a, S, I>(entries: I, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
    I: IntoIterator<Item = (&'a String, &'a Vec<String>)>,
{
    serializer.collect_map(entries)
}

pub(crate) fn hostnames_to_wire<S>(
    entries: &[DnsHostname],
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    write_keyed(entries.iter().map(|entry| (&entry.ip, &entry.hostnames)), serializer)
}

pub(crate) fn ips_to_wire<S>(entries: &[DnsIp], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    write_keyed(entries.iter().map(|entry| (&entry.hostname, &entry.ips)), serializer)
}

impl DnsHostname {
    pub(crate) fn from_pairs(pairs: Vec<(String, Vec<String>)>) -> Vec<Self> {
        pairs
            .into_iter()
            .map(|(ip, hostnames)| Self { ip, hostnames })
            .collect()
    }
}

impl DnsIp {
    pub(crate) fn from_pairs(pairs: Vec<(String, Vec<String>)>) -> Vec<Self> {
        pairs
            .into_iter()
            .map(|(hostname, ips)| Self { hostname, ips })
            .collect()
    }
}
