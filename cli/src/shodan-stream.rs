//! # shodan-stream
//!
//! Subscribes to a banner stream and prints every banner as one JSON line.
//! Reconnect gaps and undecodable lines are reported through the log, so
//! stdout stays clean NDJSON. Ctrl-C closes the connection and exits.

use clap::{Parser, Subcommand};
use lib_shodan::loggers::init_logging;
use lib_shodan::{Dispatcher, StreamEvent, StreamTarget};
use shodan_cli::ConnectionArgs;
use tracing::{info, warn};

#[derive(Parser)]
#[clap(
    name = "shodan-stream",
    version,
    author = "ckir",
    about = "Prints a Shodan banner stream as NDJSON.",
    long_about = "Opens one of the real-time banner streams and writes each banner to stdout \
                  as a JSON line. Dropped connections are re-established with backoff."
)]
struct Cli {
    #[clap(flatten)]
    connection: ConnectionArgs,

    /// Stop after this many banners.
    #[clap(long, short = 'n')]
    limit: Option<u64>,

    #[clap(subcommand)]
    target: Target,
}

#[derive(Subcommand)]
enum Target {
    /// Banners for all network alerts on the account.
    Alerts,
    /// Banners for one network alert.
    Alert { id: String },
    /// All banners. Requires a data license.
    Firehose,
    /// Banners for autonomous systems, e.g. `3303 32475`.
    Asn {
        #[clap(required = true)]
        asns: Vec<String>,
    },
    /// Banners for two-letter country codes.
    Countries {
        #[clap(required = true)]
        codes: Vec<String>,
    },
    /// Banners for ports.
    Ports {
        #[clap(required = true)]
        ports: Vec<u16>,
    },
}

impl From<Target> for StreamTarget {
    fn from(target: Target) -> Self {
        match target {
            Target::Alerts => StreamTarget::Alerts,
            Target::Alert { id } => StreamTarget::Alert { id },
            Target::Firehose => StreamTarget::Firehose,
            Target::Asn { asns } => StreamTarget::Asn(asns),
            Target::Countries { codes } => StreamTarget::Countries(codes),
            Target::Ports { ports } => StreamTarget::Ports(ports),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let config = args.connection.load()?;
    let _guard = init_logging(&config.log_options())?;
    let dispatcher = Dispatcher::connect(&config)?;

    let mut subscription = dispatcher.subscribe(&args.target.into())?;
    info!(path = subscription.path(), "Subscribed");

    let mut printed: u64 = 0;
    let outcome = loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break Ok(());
            }
            event = subscription.next_event() => event,
        };

        match event {
            Some(Ok(StreamEvent::Banner(banner))) => {
                println!("{}", serde_json::to_string(&banner)?);
                printed += 1;
                if args.limit.is_some_and(|limit| printed >= limit) {
                    break Ok(());
                }
            }
            Some(Ok(StreamEvent::Gap(gap))) => {
                warn!(
                    attempt = gap.attempt,
                    delay_ms = gap.delay_ms(),
                    reason = %gap.reason,
                    "Stream gap, reconnecting"
                );
            }
            Some(Ok(StreamEvent::Malformed(line))) => {
                warn!(error = %line.error, preview = %line.preview, "Skipped malformed line");
            }
            Some(Err(err)) => break Err(err),
            None => break Ok(()),
        }
    };

    subscription.cancel().await;
    info!(banners = printed, "Stream closed");
    Ok(outcome?)
}
