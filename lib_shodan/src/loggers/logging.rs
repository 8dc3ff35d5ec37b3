//! # Logging Setup
//!
//! Installs the global `tracing` subscriber used by the binaries:
//!
//! - an `EnvFilter` built from the configured level, overridable by `RUST_LOG`,
//! - a console layer, plain or JSON,
//! - optionally, a daily rolling file under `log_dir`, written off-thread.
//!
//! Old log files beyond `keep_files` are removed at start-up.

use std::fs;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::error::{ShodanError, ShodanResult};

type Filtered = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<Filtered> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOptions {
    /// Filter directive, e.g. `info` or `lib_shodan=debug,warn`.
    pub level: String,
    /// JSON lines on the console instead of human-readable text.
    pub json: bool,
    /// Directory for rolling log files. No file output when `None`.
    pub log_dir: Option<PathBuf>,
    pub file_prefix: String,
    /// Log files kept on disk, newest first.
    pub keep_files: usize,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            log_dir: None,
            file_prefix: "shodan".to_string(),
            keep_files: 7,
        }
    }
}

/// Installs the global subscriber.
///
/// Keep the returned guard alive for the life of the program; dropping it
/// flushes and stops the file writer.
///
/// # Errors
/// `Config` when the level does not parse, the log directory cannot be
/// prepared, or a global subscriber is already installed.
pub fn init_logging(options: &LogOptions) -> ShodanResult<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&options.level))
        .map_err(|err| ShodanError::Config(format!("log level '{}': {err}", options.level)))?;

    let mut layers: Vec<BoxedLayer> = Vec::new();
    layers.push(if options.json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    });

    let mut guard = None;
    if let Some(dir) = &options.log_dir {
        let (writer, worker) = file_writer(dir, options)?;
        layers.push(fmt::layer().with_writer(writer).with_ansi(false).boxed());
        guard = Some(worker);
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .try_init()
        .map_err(|err| ShodanError::Config(format!("logging already initialised: {err}")))?;

    Ok(guard)
}

fn file_writer(
    dir: &Path,
    options: &LogOptions,
) -> ShodanResult<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    fs::create_dir_all(dir)
        .map_err(|err| ShodanError::Config(format!("log dir {}: {err}", dir.display())))?;

    // Start-up pruning; the appender keeps pruning as it rotates
    prune_old_logs(dir, &options.file_prefix, options.keep_files)
        .map_err(|err| ShodanError::Config(format!("pruning {}: {err}", dir.display())))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(&options.file_prefix)
        .filename_suffix("log")
        .max_log_files(options.keep_files.max(1))
        .build(dir)
        .map_err(|err| ShodanError::Config(format!("log file in {}: {err}", dir.display())))?;

    Ok(tracing_appender::non_blocking(appender))
}

/// Deletes all but the `keep` most recently modified `<prefix>*.log` files.
/// Returns how many were removed.
pub fn prune_old_logs(dir: &Path, prefix: &str, keep: usize) -> std::io::Result<usize> {
    let mut entries: Vec<_> = fs::read_dir(dir)?
        .filter_map(|res| res.ok())
        .filter(|e| {
            let name = e.file_name();
            let name = name.to_string_lossy();
            name.starts_with(prefix) && name.ends_with(".log")
        })
        .filter_map(|e| {
            let modified = e.metadata().and_then(|m| m.modified()).ok()?;
            Some((modified, e.path()))
        })
        .collect();

    // Newest first
    entries.sort_by(|a, b| b.0.cmp(&a.0));

    let mut removed = 0;
    for (_, path) in entries.iter().skip(keep) {
        match fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) => eprintln!("Failed to delete old log file {:?}: {}", path, e),
        }
    }
    Ok(removed)
}
