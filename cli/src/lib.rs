//! Flags shared by the `shodan-*` binaries.

use std::path::PathBuf;

use clap::{ArgAction, Args, ValueHint};
use lib_shodan::configs::{ClientConfig, ClientOptions};

/// Connection and logging flags. Anything left unset falls back to the
/// environment, then the JSON config file, then the built-in defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// API key.
    #[clap(long, value_name = "KEY", env = "SHODAN_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// JSON configuration file.
    #[clap(long, env = "SHODAN_CONFIG_PATH", value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `lib_shodan=trace`.
    #[clap(long)]
    pub log_level: Option<String>,

    /// Write rolling log files into this directory.
    #[clap(long, value_hint = ValueHint::DirPath)]
    pub log_dir: Option<PathBuf>,

    /// Log as JSON lines.
    #[clap(long, action = ArgAction::SetTrue)]
    pub log_json: bool,
}

impl ConnectionArgs {
    /// The flags as the top configuration layer.
    pub fn overrides(&self) -> ClientOptions {
        ClientOptions {
            api_key: self.api_key.clone(),
            config_path: self.config.clone(),
            log_level: self.log_level.clone(),
            log_dir: self.log_dir.clone(),
            log_json: self.log_json.then_some(true),
            ..ClientOptions::default()
        }
    }

    pub fn load(&self) -> anyhow::Result<ClientConfig> {
        Ok(ClientOptions::load(self.overrides())?)
    }
}
