//! Wire-level leniency shared by every record kind.
//!
//! The service is loose about types: numbers sometimes arrive as numeric
//! strings, optional values arrive as `null` or not at all, and a single
//! string may stand in for a one-element list. Each helper here accepts those
//! shapes and normalizes them to the semantic Rust type. They are plugged into
//! the record structs with `#[serde(deserialize_with = ...)]`.

use serde::de::{self, Deserialize, Deserializer};
use serde_json::Value;

fn shape(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Non-negative integer from a number or numeric string. `null` and `""` are absent.
pub(crate) fn integer(value: &Value) -> Result<Option<u64>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
                    .map(|f| f as u64)
            })
            .map(Some)
            .ok_or_else(|| format!("{n} is not a non-negative integer")),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| format!("'{s}' is not a non-negative integer")),
        other => Err(format!("expected an integer, found {}", shape(other))),
    }
}

/// Signed integer from a number or numeric string.
pub(crate) fn signed(value: &Value) -> Result<Option<i64>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .map(Some)
            .ok_or_else(|| format!("{n} is not an integer")),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| format!("'{s}' is not an integer")),
        other => Err(format!("expected an integer, found {}", shape(other))),
    }
}

/// Floating point value from a number or numeric string.
pub(crate) fn float(value: &Value) -> Result<Option<f64>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| format!("{n} is not representable as f64")),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| format!("'{s}' is not a number")),
        other => Err(format!("expected a number, found {}", shape(other))),
    }
}

/// Scalar rendered as text. `null` becomes the empty string.
pub(crate) fn text(value: &Value) -> Result<String, String> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(format!("expected a string, found {}", shape(other))),
    }
}

/// Ordered list of strings. Source order and duplicates are kept.
///
/// A bare string is a one-element list, `null` an empty one, and an object
/// contributes its keys (the service keys some lists, e.g. `vulns`, by name).
pub(crate) fn text_list(value: &Value) -> Result<Vec<String>, String> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(s) if s.is_empty() => Ok(Vec::new()),
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(text)
            .collect(),
        Value::Object(map) => Ok(map.keys().cloned().collect()),
        other => Err(format!("expected a list of strings, found {}", shape(other))),
    }
}

fn to_port(n: u64) -> Result<u16, String> {
    u16::try_from(n).map_err(|_| format!("port {n} is out of range"))
}

/// Required port.
pub(crate) fn port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    let n = integer(&raw)
        .map_err(<D::Error as de::Error>::custom)?
        .ok_or_else(|| <D::Error as de::Error>::custom("port is null"))?;
    to_port(n).map_err(de::Error::custom)
}

/// Ordered list of ports, duplicates kept.
pub(crate) fn port_list<'de, D>(deserializer: D) -> Result<Vec<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| integer(item).transpose())
            .map(|n| n.and_then(to_port))
            .collect::<Result<_, _>>()
            .map_err(de::Error::custom),
        other => Err(de::Error::custom(format!(
            "expected a list of ports, found {}",
            shape(&other)
        ))),
    }
}

pub(crate) fn opt_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    integer(&Value::deserialize(deserializer)?).map_err(de::Error::custom)
}

pub(crate) fn u64_or_zero<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_u64(deserializer)?.unwrap_or_default())
}

pub(crate) fn i64_or_zero<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    signed(&Value::deserialize(deserializer)?)
        .map(Option::unwrap_or_default)
        .map_err(de::Error::custom)
}

pub(crate) fn opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    float(&Value::deserialize(deserializer)?).map_err(de::Error::custom)
}

pub(crate) fn f64_or_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_f64(deserializer)?.unwrap_or_default())
}

pub(crate) fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    text(&Value::deserialize(deserializer)?).map_err(de::Error::custom)
}

pub(crate) fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    text_list(&Value::deserialize(deserializer)?).map_err(de::Error::custom)
}

/// `null` or absent maps to `T::default()`.
pub(crate) fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_accept_numeric_strings() {
        assert_eq!(integer(&json!(80)).unwrap(), Some(80));
        assert_eq!(integer(&json!("443")).unwrap(), Some(443));
        assert_eq!(integer(&json!(" 22 ")).unwrap(), Some(22));
        assert_eq!(integer(&json!(8080.0)).unwrap(), Some(8080));
        assert_eq!(integer(&json!("")).unwrap(), None);
        assert_eq!(integer(&Value::Null).unwrap(), None);
        assert!(integer(&json!("http")).is_err());
        assert!(integer(&json!(-1)).is_err());
        assert!(integer(&json!([1])).is_err());

        assert_eq!(float(&json!("37.751")).unwrap(), Some(37.751));
        assert_eq!(signed(&json!("-97")).unwrap(), Some(-97));
    }

    #[test]
    fn lists_keep_order_and_duplicates() {
        assert_eq!(
            text_list(&json!(["b", "a", "b"])).unwrap(),
            vec!["b".to_string(), "a".to_string(), "b".to_string()]
        );
        assert_eq!(text_list(&json!("solo")).unwrap(), vec!["solo".to_string()]);
        assert!(text_list(&Value::Null).unwrap().is_empty());
        assert_eq!(
            text_list(&json!({"CVE-2019-0001": {}, "CVE-2014-0160": {}})).unwrap(),
            vec!["CVE-2019-0001".to_string(), "CVE-2014-0160".to_string()]
        );
    }

    #[test]
    fn text_renders_scalars() {
        assert_eq!(text(&json!(15169)).unwrap(), "15169");
        assert_eq!(text(&Value::Null).unwrap(), "");
        assert!(text(&json!({"a": 1})).is_err());
    }
}
