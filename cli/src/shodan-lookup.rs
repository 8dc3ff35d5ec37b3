//! # shodan-lookup
//!
//! Runs one search or lookup call and prints the decoded record as JSON.

use clap::{ArgAction, Parser, Subcommand};
use lib_shodan::loggers::init_logging;
use lib_shodan::{Dispatcher, Operation, QueryListParams, SortKey, SortOrder};
use shodan_cli::ConnectionArgs;

#[derive(Parser)]
#[clap(
    name = "shodan-lookup",
    version,
    author = "ckir",
    about = "Runs a single Shodan search or lookup call.",
    long_about = "Builds the request for one operation, sends it, decodes the response into \
                  its typed record and prints it as JSON on stdout."
)]
struct Cli {
    #[clap(flatten)]
    connection: ConnectionArgs,

    /// Output minified JSON instead of pretty-printed.
    #[clap(long, action = ArgAction::SetTrue)]
    minify: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Protocols usable for on-demand scans.
    Protocols,
    /// Hostnames for IP addresses.
    ReverseDns {
        #[clap(required = true)]
        ips: Vec<String>,
    },
    /// IP addresses for hostnames.
    ResolveDns {
        #[clap(required = true)]
        hostnames: Vec<String>,
    },
    /// Ports the crawlers look at.
    Ports,
    /// Breaks a search query into filters and terms.
    Tokens { query: String },
    /// Saved search queries.
    SavedQueries {
        #[clap(long)]
        page: Option<u32>,
        /// `votes` or `timestamp`.
        #[clap(long)]
        sort: Option<SortKey>,
        /// `asc` or `desc`.
        #[clap(long)]
        order: Option<SortOrder>,
    },
    /// Searches the saved queries.
    SearchQueries {
        query: String,
        #[clap(long)]
        page: Option<u32>,
    },
    /// Most popular saved-query tags.
    Tags {
        #[clap(long)]
        size: Option<u32>,
    },
    /// Everything known about one IP address.
    Host {
        ip: String,
        /// Include historical banners.
        #[clap(long, action = ArgAction::SetTrue)]
        history: bool,
        /// Ports and general information only.
        #[clap(long, action = ArgAction::SetTrue)]
        minify: bool,
    },
    /// Result count and facets for a query, without credits.
    Count {
        query: String,
        #[clap(long)]
        facets: Option<String>,
    },
    /// Searches the banner database.
    Search {
        query: String,
        #[clap(long)]
        facets: Option<String>,
        #[clap(long)]
        page: Option<u32>,
    },
    /// Account profile.
    Account,
    /// Plan and remaining credits.
    ApiInfo,
    /// Your public IP address as seen by the service.
    MyIp,
    /// Request headers as seen by the service.
    Headers,
    /// Probability that an IP address is a honeypot.
    Honeyscore { ip: String },
}

impl Command {
    fn into_operation(self) -> Operation {
        match self {
            Self::Protocols => Operation::Protocols,
            Self::ReverseDns { ips } => Operation::ReverseDns { ips },
            Self::ResolveDns { hostnames } => Operation::ResolveDns { hostnames },
            Self::Ports => Operation::CrawledPorts,
            Self::Tokens { query } => Operation::QueryTokens { query },
            Self::SavedQueries { page, sort, order } => {
                let mut params = QueryListParams::new();
                if let Some(page) = page {
                    params = params.page(page);
                }
                if let Some(sort) = sort {
                    params = params.sort(sort);
                }
                if let Some(order) = order {
                    params = params.order(order);
                }
                Operation::SavedQueries(params)
            }
            Self::SearchQueries { query, page } => Operation::SearchQueries { query, page },
            Self::Tags { size } => Operation::QueryTags { size },
            Self::Host { ip, history, minify } => Operation::Host { ip, history, minify },
            Self::Count { query, facets } => Operation::HostCount { query, facets },
            Self::Search { query, facets, page } => Operation::HostSearch { query, facets, page },
            Self::Account => Operation::AccountProfile,
            Self::ApiInfo => Operation::ApiInfo,
            Self::MyIp => Operation::MyIp,
            Self::Headers => Operation::HttpHeaders,
            Self::Honeyscore { ip } => Operation::HoneyScore { ip },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let config = args.connection.load()?;
    let _guard = init_logging(&config.log_options())?;
    let dispatcher = Dispatcher::connect(&config)?;

    let operation = args.command.into_operation();
    tracing::debug!(?operation, "Running lookup");
    let record = dispatcher.call(&operation).await?;

    let json = if args.minify {
        serde_json::to_string(&record)?
    } else {
        serde_json::to_string_pretty(&record)?
    };
    println!("{}", json);
    Ok(())
}
