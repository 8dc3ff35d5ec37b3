//! # Report Records
//!
//! Paged and aggregated answers. Every report wraps the service's total count
//! and an ordered list of matches; the order is the service's and is kept.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::banner::Banner;
use crate::decode::lenient;

/// One saved search query from the query directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedQuery {
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub query: String,
    #[serde(default, deserialize_with = "lenient::i64_or_zero")]
    pub votes: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub timestamp: String,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub tags: Vec<String>,
}

/// Answer of the saved-query listing and the query directory search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryReport {
    #[serde(default, deserialize_with = "lenient::u64_or_zero")]
    pub total: u64,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub matches: Vec<SavedQuery>,
}

/// A popular tag and how many saved queries carry it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    #[serde(default, deserialize_with = "lenient::string")]
    pub value: String,
    #[serde(default, deserialize_with = "lenient::u64_or_zero")]
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagReport {
    #[serde(default, deserialize_with = "lenient::u64_or_zero")]
    pub total: u64,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub matches: Vec<TagCount>,
}

/// One bucket of a facet, e.g. `US` with 1200 results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetValue {
    #[serde(default, deserialize_with = "lenient::string")]
    pub value: String,
    #[serde(default, deserialize_with = "lenient::u64_or_zero")]
    pub count: u64,
}

/// A requested summary aggregation, in the order the service listed it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Facet {
    pub name: String,
    pub values: Vec<FacetValue>,
}

/// Answer of the count endpoint: totals and facets, no matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacetReport {
    #[serde(default, deserialize_with = "lenient::u64_or_zero")]
    pub total: u64,
    #[serde(
        default,
        deserialize_with = "facets_from_wire",
        serialize_with = "facets_to_wire"
    )]
    pub facets: Vec<Facet>,
}

impl FacetReport {
    pub fn facet(&self, name: &str) -> Option<&Facet> {
        self.facets.iter().find(|facet| facet.name == name)
    }
}

/// Answer of the full search: matching banners plus any requested facets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostReport {
    #[serde(default, deserialize_with = "lenient::u64_or_zero")]
    pub total: u64,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub matches: Vec<Banner>,
    #[serde(
        default,
        deserialize_with = "facets_from_wire",
        serialize_with = "facets_to_wire"
    )]
    pub facets: Vec<Facet>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAttributes {
    #[serde(default, deserialize_with = "lenient::port_list")]
    pub ports: Vec<u16>,
}

/// How the service tokenised a search query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenReport {
    /// Free-text part of the query.
    #[serde(rename = "string", default, deserialize_with = "lenient::string")]
    pub query_string: String,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub filters: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub errors: Vec<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub attributes: TokenAttributes,
}

impl TokenReport {
    /// The service sends no total for tokens; this is the number of filters found.
    pub fn total(&self) -> usize {
        self.filters.len()
    }
}

fn facets_from_wire<'de, D>(deserializer: D) -> Result<Vec<Facet>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Map<String, Value>> = Option::deserialize(deserializer)?;
    raw.unwrap_or_default()
        .into_iter()
        .map(|(name, values)| {
            let values = match values {
                Value::Null => Vec::new(),
                other => Vec::<FacetValue>::deserialize(other)
                    .map_err(|err| {
                        <D::Error as de::Error>::custom(format!("facet '{name}': {err}"))
                    })?,
            };
            Ok(Facet { name, values })
        })
        .collect()
}

fn facets_to_wire<S>(facets: &[Facet], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeMap;

    let mut map = serializer.serialize_map(Some(facets.len()))?;
    for facet in facets {
        map.serialize_entry(&facet.name, &facet.values)?;
    }
    map.end()
}
