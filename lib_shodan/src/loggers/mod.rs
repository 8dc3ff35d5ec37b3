/// Installs the tracing subscriber with console and rolling file output.
pub mod logging;

pub use logging::{init_logging, prune_old_logs, LogOptions};
