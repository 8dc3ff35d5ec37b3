// Typed records returned by the service.
pub mod account;
pub mod banner;
pub mod dns;
pub mod host;
pub mod reports;

pub use account::{Account, ApiStatus, ExternalIp, HoneyScore, HttpHeaders, Protocol, UsageLimits};
pub use banner::{parse_service_timestamp, Banner, CrawlerInfo, Location};
pub use dns::{DnsHostname, DnsIp};
pub use host::Host;
pub use reports::{
    Facet, FacetReport, FacetValue, HostReport, QueryReport, SavedQuery, TagCount, TagReport,
    TokenAttributes, TokenReport,
};
