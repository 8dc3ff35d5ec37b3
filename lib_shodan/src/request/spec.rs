//! The immutable request description handed to a [`Transport`](crate::Transport).

use std::fmt;

/// HTTP verb of a request. Every Shodan call used here is a `GET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HttpMethod {
    #[default]
    Get,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
        }
    }
}

/// Method, path and ordered query parameters of one call.
///
/// The path is relative to whichever base URL the transport uses for the call
/// (API host for one-shot calls, stream host for subscriptions). Values are
/// built once by [`RequestBuilder`](crate::RequestBuilder) and never mutated.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RequestSpec {
    method: HttpMethod,
    path: String,
    query: Vec<(String, String)>,
}

/// Query parameter that carries the API key.
pub const KEY_PARAM: &str = "key";

impl RequestSpec {
    pub(crate) fn new(method: HttpMethod, path: String, query: Vec<(String, String)>) -> Self {
        Self {
            method,
            path,
            query,
        }
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query parameters in the order they go on the wire.
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// First value of a query parameter.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Renders `GET path?a=1&key=***`. The API key is never printed.
impl fmt::Display for RequestSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method.as_str(), self.path)?;
        for (index, (name, value)) in self.query.iter().enumerate() {
            let sep = if index == 0 { '?' } else { '&' };
            if name == KEY_PARAM {
                write!(f, "{sep}{name}=***")?;
            } else {
                write!(f, "{sep}{name}={value}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for RequestSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestSpec({self})")
    }
}

/// Substitutes `{name}` placeholders in a path template.
pub(crate) fn expand_template(template: &str, params: &[(&str, &str)]) -> String {
    params
        .iter()
        .fold(template.to_owned(), |path, (name, value)| {
            path.replace(&format!("{{{name}}}"), value)
        })
}
