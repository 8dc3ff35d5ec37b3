//! Account, plan and small tool answers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::decode::lenient;

/// Profile of the account owning the API key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub member: bool,
    #[serde(default, deserialize_with = "lenient::i64_or_zero")]
    pub credits: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub display_name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub created: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLimits {
    #[serde(default, deserialize_with = "lenient::i64_or_zero")]
    pub scan_credits: i64,
    #[serde(default, deserialize_with = "lenient::i64_or_zero")]
    pub query_credits: i64,
    #[serde(default, deserialize_with = "lenient::i64_or_zero")]
    pub monitored_ips: i64,
}

/// Plan information and remaining credits for the API key.
///
/// Credit counters are signed: the service reports `-1` for unlimited plans.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiStatus {
    #[serde(default, deserialize_with = "lenient::string")]
    pub plan: String,
    #[serde(default, deserialize_with = "lenient::i64_or_zero")]
    pub query_credits: i64,
    #[serde(default, deserialize_with = "lenient::i64_or_zero")]
    pub scan_credits: i64,
    #[serde(default, deserialize_with = "lenient::i64_or_zero")]
    pub monitored_ips: i64,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub unlocked: bool,
    #[serde(default, deserialize_with = "lenient::i64_or_zero")]
    pub unlocked_left: i64,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub telnet: bool,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub https: bool,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub usage_limits: UsageLimits,
}

/// A protocol the crawlers can scan with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protocol {
    pub name: String,
    pub description: String,
}

impl Protocol {
    /// `{name: description}` object into a list, wire order kept.
    pub(crate) fn list_from_wire(value: &Value) -> Result<Vec<Self>, String> {
        let map = value
            .as_object()
            .ok_or_else(|| "expected an object of protocol descriptions".to_string())?;
        map.iter()
            .map(|(name, description)| {
                Ok(Self {
                    name: name.clone(),
                    description: lenient::text(description)
                        .map_err(|reason| format!("protocol '{name}': {reason}"))?,
                })
            })
            .collect()
    }
}

pub(crate) fn protocols_to_wire<S>(
    protocols: &[Protocol],
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_map(
        protocols
            .iter()
            .map(|protocol| (&protocol.name, &protocol.description)),
    )
}

/// The request headers the service saw, as ordered name/value pairs.
/// Serializes as the `{name: value}` object it was decoded from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpHeaders(pub Vec<(String, String)>);

impl Serialize for HttpHeaders {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_map(self.0.iter().map(|(name, value)| (name, value)))
    }
}

impl HttpHeaders {
    pub(crate) fn from_wire(value: &Value) -> Result<Self, String> {
        let map = value
            .as_object()
            .ok_or_else(|| "expected an object of header values".to_string())?;
        map.iter()
            .map(|(name, raw)| {
                lenient::text(raw)
                    .map(|text| (name.clone(), text))
                    .map_err(|reason| format!("header '{name}': {reason}"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// Case-insensitive lookup of the first header with this name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// The caller's address as seen by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExternalIp(pub String);

/// Probability in `[0, 1]` that an address is a honeypot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct HoneyScore(pub f64);

impl HoneyScore {
    pub(crate) fn from_wire(value: &Value) -> Result<Self, String> {
        let score = lenient::float(value)?.ok_or_else(|| "score is missing".to_string())?;
        if (0.0..=1.0).contains(&score) {
            Ok(Self(score))
        } else {
            Err(format!("score {score} is outside [0, 1]"))
        }
    }
}
