//! # Client Configuration
//!
//! Settings are layered; each layer only overrides the fields it sets:
//!
//! 1. built-in defaults,
//! 2. a JSON file (`SHODAN_CONFIG_PATH` or an explicit path), camelCase keys,
//! 3. environment variables, after loading a `.env` file if one exists,
//! 4. explicit overrides, typically parsed command-line flags.
//!
//! The merged [`ClientOptions`] are then resolved into a validated
//! [`ClientConfig`].

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ShodanError, ShodanResult};
use crate::ingestors::{BackoffPolicy, StreamConfig};

pub const ENV_API_KEY: &str = "SHODAN_API_KEY";
pub const ENV_API_URL: &str = "SHODAN_API_URL";
pub const ENV_STREAM_URL: &str = "SHODAN_STREAM_URL";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "SHODAN_REQUEST_TIMEOUT_MS";
pub const ENV_CONNECT_TIMEOUT_MS: &str = "SHODAN_CONNECT_TIMEOUT_MS";
pub const ENV_READ_TIMEOUT_MS: &str = "SHODAN_READ_TIMEOUT_MS";
pub const ENV_STREAM_BUFFER: &str = "SHODAN_STREAM_BUFFER";
pub const ENV_RECONNECT_BASE_DELAY_MS: &str = "SHODAN_RECONNECT_BASE_DELAY_MS";
pub const ENV_RECONNECT_MAX_DELAY_MS: &str = "SHODAN_RECONNECT_MAX_DELAY_MS";
pub const ENV_RECONNECT_MAX_ATTEMPTS: &str = "SHODAN_RECONNECT_MAX_ATTEMPTS";
pub const ENV_RECONNECT_JITTER_MS: &str = "SHODAN_RECONNECT_JITTER_MS";
pub const ENV_LOG_LEVEL: &str = "SHODAN_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "SHODAN_LOG_DIR";
pub const ENV_LOG_JSON: &str = "SHODAN_LOG_JSON";
pub const ENV_CONFIG_PATH: &str = "SHODAN_CONFIG_PATH";

/// One configuration layer. Every field is optional.
#[derive(Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClientOptions {
    pub api_key: Option<String>,
    pub api_base_url: Option<String>,
    pub stream_base_url: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
    pub read_timeout_ms: Option<u64>,
    pub stream_buffer_capacity: Option<usize>,
    pub reconnect_base_delay_ms: Option<u64>,
    pub reconnect_max_delay_ms: Option<u64>,
    pub reconnect_max_attempts: Option<u32>,
    pub reconnect_jitter_ms: Option<u64>,
    pub log_level: Option<String>,
    pub log_dir: Option<PathBuf>,
    pub log_json: Option<bool>,
    /// Where the JSON layer is read from. Not itself read from the file.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("api_base_url", &self.api_base_url)
            .field("stream_base_url", &self.stream_base_url)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("read_timeout_ms", &self.read_timeout_ms)
            .field("stream_buffer_capacity", &self.stream_buffer_capacity)
            .field("reconnect_base_delay_ms", &self.reconnect_base_delay_ms)
            .field("reconnect_max_delay_ms", &self.reconnect_max_delay_ms)
            .field("reconnect_max_attempts", &self.reconnect_max_attempts)
            .field("reconnect_jitter_ms", &self.reconnect_jitter_ms)
            .field("log_level", &self.log_level)
            .field("log_dir", &self.log_dir)
            .field("log_json", &self.log_json)
            .field("config_path", &self.config_path)
            .finish()
    }
}

impl ClientOptions {
    /// The built-in layer.
    pub fn defaults() -> Self {
        Self {
            api_key: None,
            api_base_url: Some("https://api.shodan.io/".to_string()),
            stream_base_url: Some("https://stream.shodan.io/".to_string()),
            request_timeout_ms: Some(30_000),
            connect_timeout_ms: Some(10_000),
            read_timeout_ms: Some(90_000),
            stream_buffer_capacity: Some(1024),
            reconnect_base_delay_ms: Some(1_000),
            reconnect_max_delay_ms: Some(60_000),
            reconnect_max_attempts: Some(10),
            reconnect_jitter_ms: Some(500),
            log_level: Some("info".to_string()),
            log_dir: None,
            log_json: Some(false),
            config_path: None,
        }
    }

    /// Fields set in `other` win.
    pub fn merge(self, other: ClientOptions) -> ClientOptions {
        ClientOptions {
            api_key: other.api_key.or(self.api_key),
            api_base_url: other.api_base_url.or(self.api_base_url),
            stream_base_url: other.stream_base_url.or(self.stream_base_url),
            request_timeout_ms: other.request_timeout_ms.or(self.request_timeout_ms),
            connect_timeout_ms: other.connect_timeout_ms.or(self.connect_timeout_ms),
            read_timeout_ms: other.read_timeout_ms.or(self.read_timeout_ms),
            stream_buffer_capacity: other.stream_buffer_capacity.or(self.stream_buffer_capacity),
            reconnect_base_delay_ms: other.reconnect_base_delay_ms.or(self.reconnect_base_delay_ms),
            reconnect_max_delay_ms: other.reconnect_max_delay_ms.or(self.reconnect_max_delay_ms),
            reconnect_max_attempts: other.reconnect_max_attempts.or(self.reconnect_max_attempts),
            reconnect_jitter_ms: other.reconnect_jitter_ms.or(self.reconnect_jitter_ms),
            log_level: other.log_level.or(self.log_level),
            log_dir: other.log_dir.or(self.log_dir),
            log_json: other.log_json.or(self.log_json),
            config_path: other.config_path.or(self.config_path),
        }
    }

    /// Reads a JSON layer.
    pub fn from_file(path: &Path) -> ShodanResult<Self> {
        let raw = fs::read_to_string(path).map_err(|err| {
            ShodanError::Config(format!("cannot read {}: {err}", path.display()))
        })?;
        serde_json::from_str(&raw)
            .map_err(|err| ShodanError::Config(format!("cannot parse {}: {err}", path.display())))
    }

    /// Builds a layer from variables resolved through `lookup`. Blank values
    /// count as unset.
    pub fn from_vars<F>(lookup: F) -> ShodanResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Ok(Self {
            api_key: get(ENV_API_KEY),
            api_base_url: get(ENV_API_URL),
            stream_base_url: get(ENV_STREAM_URL),
            request_timeout_ms: parse_var(ENV_REQUEST_TIMEOUT_MS, get(ENV_REQUEST_TIMEOUT_MS))?,
            connect_timeout_ms: parse_var(ENV_CONNECT_TIMEOUT_MS, get(ENV_CONNECT_TIMEOUT_MS))?,
            read_timeout_ms: parse_var(ENV_READ_TIMEOUT_MS, get(ENV_READ_TIMEOUT_MS))?,
            stream_buffer_capacity: parse_var(ENV_STREAM_BUFFER, get(ENV_STREAM_BUFFER))?,
            reconnect_base_delay_ms: parse_var(
                ENV_RECONNECT_BASE_DELAY_MS,
                get(ENV_RECONNECT_BASE_DELAY_MS),
            )?,
            reconnect_max_delay_ms: parse_var(
                ENV_RECONNECT_MAX_DELAY_MS,
                get(ENV_RECONNECT_MAX_DELAY_MS),
            )?,
            reconnect_max_attempts: parse_var(
                ENV_RECONNECT_MAX_ATTEMPTS,
                get(ENV_RECONNECT_MAX_ATTEMPTS),
            )?,
            reconnect_jitter_ms: parse_var(ENV_RECONNECT_JITTER_MS, get(ENV_RECONNECT_JITTER_MS))?,
            log_level: get(ENV_LOG_LEVEL),
            log_dir: get(ENV_LOG_DIR).map(PathBuf::from),
            log_json: parse_var(ENV_LOG_JSON, get(ENV_LOG_JSON))?,
            config_path: get(ENV_CONFIG_PATH).map(PathBuf::from),
        })
    }

    /// The process environment as a layer.
    pub fn from_env() -> ShodanResult<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Full load: `.env`, defaults, file, environment, then `overrides`.
    pub fn load(overrides: ClientOptions) -> ShodanResult<ClientConfig> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "Loaded .env file"),
            Err(err) if err.not_found() => {}
            Err(err) => return Err(ShodanError::Config(format!(".env: {err}"))),
        }
        Self::load_with(overrides, |name| std::env::var(name).ok())
    }

    /// [`load`](Self::load) with an injectable variable source and no `.env`.
    pub fn load_with<F>(overrides: ClientOptions, lookup: F) -> ShodanResult<ClientConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        // 1. Defaults
        let mut current = Self::defaults();

        // 2. JSON file, when one is named
        let env_layer = Self::from_vars(lookup)?;
        let file_path = overrides
            .config_path
            .clone()
            .or_else(|| env_layer.config_path.clone());
        if let Some(path) = file_path {
            info!(path = %path.display(), "Reading configuration file");
            current = current.merge(Self::from_file(&path)?);
        }

        // 3. Environment, 4. explicit overrides
        current.merge(env_layer).merge(overrides).resolve()
    }

    /// Validates the merged layers.
    pub fn resolve(self) -> ShodanResult<ClientConfig> {
        let defaults = Self::defaults();
        let this = defaults.merge(self);

        let api_key = this
            .api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                ShodanError::Config(format!("no API key: set {ENV_API_KEY} or pass one"))
            })?;

        let millis = |name: &str, value: Option<u64>| -> ShodanResult<Duration> {
            match value {
                Some(0) | None => Err(ShodanError::Config(format!("{name} must be positive"))),
                Some(ms) => Ok(Duration::from_millis(ms)),
            }
        };
        let base = millis("reconnectBaseDelayMs", this.reconnect_base_delay_ms)?;
        let cap = millis("reconnectMaxDelayMs", this.reconnect_max_delay_ms)?;
        if base > cap {
            return Err(ShodanError::Config(
                "reconnectBaseDelayMs exceeds reconnectMaxDelayMs".to_string(),
            ));
        }
        // Jitter below the base keeps uncapped gap delays strictly increasing.
        let jitter = Duration::from_millis(this.reconnect_jitter_ms.unwrap_or_default());
        if jitter >= base {
            return Err(ShodanError::Config(
                "reconnectJitterMs must be below reconnectBaseDelayMs".to_string(),
            ));
        }
        let stream_buffer_capacity = match this.stream_buffer_capacity {
            Some(0) | None => {
                return Err(ShodanError::Config(
                    "streamBufferCapacity must be positive".to_string(),
                ))
            }
            Some(n) => n,
        };

        Ok(ClientConfig {
            api_key,
            api_base_url: this.api_base_url.unwrap_or_default(),
            stream_base_url: this.stream_base_url.unwrap_or_default(),
            request_timeout: millis("requestTimeoutMs", this.request_timeout_ms)?,
            connect_timeout: millis("connectTimeoutMs", this.connect_timeout_ms)?,
            read_timeout: millis("readTimeoutMs", this.read_timeout_ms)?,
            stream_buffer_capacity,
            backoff: BackoffPolicy {
                base,
                cap,
                max_attempts: this.reconnect_max_attempts.unwrap_or_default(),
                jitter,
            },
            log_level: this.log_level.unwrap_or_else(|| "info".to_string()),
            log_dir: this.log_dir,
            log_json: this.log_json.unwrap_or_default(),
        })
    }
}

fn parse_var<T: FromStr>(name: &str, raw: Option<String>) -> ShodanResult<Option<T>> {
    raw.map(|raw| {
        raw.parse::<T>()
            .map_err(|_| ShodanError::Config(format!("{name}='{raw}' is not a valid value")))
    })
    .transpose()
}

/// Resolved, validated settings.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_key: String,
    pub api_base_url: String,
    pub stream_base_url: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub stream_buffer_capacity: usize,
    pub backoff: BackoffPolicy,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
    pub log_json: bool,
}

impl ClientConfig {
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            buffer_capacity: self.stream_buffer_capacity,
            read_timeout: self.read_timeout,
            backoff: self.backoff.clone(),
            ..StreamConfig::default()
        }
    }

    #[cfg(feature = "loggers")]
    pub fn log_options(&self) -> crate::loggers::LogOptions {
        crate::loggers::LogOptions {
            level: self.log_level.clone(),
            json: self.log_json,
            log_dir: self.log_dir.clone(),
            ..crate::loggers::LogOptions::default()
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"***")
            .field("api_base_url", &self.api_base_url)
            .field("stream_base_url", &self.stream_base_url)
            .field("request_timeout", &self.request_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("stream_buffer_capacity", &self.stream_buffer_capacity)
            .field("backoff", &self.backoff)
            .field("log_level", &self.log_level)
            .field("log_dir", &self.log_dir)
            .field("log_json", &self.log_json)
            .finish()
    }
}
