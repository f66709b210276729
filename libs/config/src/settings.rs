//! Settings file loading
//!
//! Layering, lowest priority first:
//! 1. serde defaults from [`crate::defaults`]
//! 2. base TOML file (`config/tapline.toml` unless given)
//! 3. `config/environments/<env>.toml` when an environment is named
//! 4. `TAPLINE_<SECTION>__<KEY>` environment variables

use crate::defaults;
use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const DEFAULT_SETTINGS_PATH: &str = "config/tapline.toml";
const ENVIRONMENTS_DIR: &str = "config/environments";

/// Complete client settings
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProxySettings {
    #[serde(default)]
    pub global: GlobalSettings,

    #[serde(default)]
    pub connection: ConnectionSettings,

    #[serde(default)]
    pub credentials: CredentialSettings,

    #[serde(default)]
    pub series: SeriesSettings,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GlobalSettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub json_logs: bool,
}

/// How the collector is reached
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Tcp,
    Unix,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConnectionSettings {
    #[serde(default)]
    pub transport: TransportKind,

    /// `host:port` for TCP, a socket path for Unix
    #[serde(default = "default_address")]
    pub address: String,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,

    #[serde(default = "default_stale_factor")]
    pub stale_factor: u32,

    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,

    #[serde(default = "default_push_channel_capacity")]
    pub push_channel_capacity: usize,

    #[serde(default = "default_outbound_queue_size")]
    pub outbound_queue_size: usize,
}

#[derive(Deserialize, Serialize, Clone)]
pub struct CredentialSettings {
    #[serde(default)]
    pub token: String,

    #[serde(default = "default_client_name")]
    pub client_name: String,
}

impl fmt::Debug for CredentialSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSettings")
            .field("token", &if self.token.is_empty() { "<empty>" } else { "<redacted>" })
            .field("client_name", &self.client_name)
            .finish()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SeriesSettings {
    #[serde(default = "default_retention")]
    pub retention: usize,

    #[serde(default = "default_update_channel_capacity")]
    pub update_channel_capacity: usize,
}

fn default_log_level() -> String {
    defaults::logging::LOG_LEVEL.to_string()
}
fn default_address() -> String {
    defaults::connection::ADDRESS.to_string()
}
fn default_request_timeout_ms() -> u64 {
    defaults::connection::REQUEST_TIMEOUT_MS
}
fn default_connect_timeout_ms() -> u64 {
    defaults::connection::CONNECT_TIMEOUT_MS
}
fn default_sweep_interval_ms() -> u64 {
    defaults::connection::SWEEP_INTERVAL_MS
}
fn default_stale_factor() -> u32 {
    defaults::connection::STALE_FACTOR
}
fn default_max_message_size() -> usize {
    defaults::connection::MAX_MESSAGE_SIZE
}
fn default_read_buffer_size() -> usize {
    defaults::connection::READ_BUFFER_SIZE
}
fn default_push_channel_capacity() -> usize {
    defaults::connection::PUSH_CHANNEL_CAPACITY
}
fn default_outbound_queue_size() -> usize {
    defaults::connection::OUTBOUND_QUEUE_SIZE
}
fn default_client_name() -> String {
    defaults::client::CLIENT_NAME.to_string()
}
fn default_retention() -> usize {
    defaults::series::RETENTION
}
fn default_update_channel_capacity() -> usize {
    defaults::series::UPDATE_CHANNEL_CAPACITY
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            address: default_address(),
            request_timeout_ms: default_request_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
            stale_factor: default_stale_factor(),
            max_message_size: default_max_message_size(),
            read_buffer_size: default_read_buffer_size(),
            push_channel_capacity: default_push_channel_capacity(),
            outbound_queue_size: default_outbound_queue_size(),
        }
    }
}

impl Default for CredentialSettings {
    fn default() -> Self {
        Self {
            token: String::new(),
            client_name: default_client_name(),
        }
    }
}

impl Default for SeriesSettings {
    fn default() -> Self {
        Self {
            retention: default_retention(),
            update_channel_capacity: default_update_channel_capacity(),
        }
    }
}

impl ProxySettings {
    /// Load settings from files with environment overrides
    ///
    /// An explicitly given `base_path` must exist. The default path is
    /// optional so the client runs on defaults alone.
    pub fn load(base_path: Option<&Path>, environment: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        builder = match base_path {
            Some(path) => {
                debug!(path = ?path, "Loading settings file");
                builder.add_source(File::from(path).required(true))
            }
            None => builder.add_source(File::with_name(DEFAULT_SETTINGS_PATH).required(false)),
        };

        if let Some(env) = environment {
            let env_file = PathBuf::from(ENVIRONMENTS_DIR).join(format!("{}.toml", env));

            if env_file.exists() {
                info!("Loading environment settings: {:?}", env_file);
                builder = builder.add_source(File::from(env_file));
            } else {
                warn!("Environment settings not found: {:?}", env_file);
            }
        }

        // TAPLINE_CONNECTION__REQUEST_TIMEOUT_MS -> connection.request_timeout_ms
        builder = builder.add_source(
            Environment::with_prefix("TAPLINE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build settings")?;

        config
            .try_deserialize()
            .context("Failed to deserialize settings")
    }

    /// Expand `$VAR` / `${VAR}` references in address and token
    pub fn expand_env_vars(&mut self) -> Result<()> {
        let address = shellexpand::env(&self.connection.address)
            .context("Failed to expand connection address")?;
        self.connection.address = address.to_string();

        let token =
            shellexpand::env(&self.credentials.token).context("Failed to expand credentials token")?;
        self.credentials.token = token.to_string();

        Ok(())
    }

    /// Reject settings the client cannot run with
    pub fn validate(&self) -> Result<()> {
        let conn = &self.connection;

        if conn.address.trim().is_empty() {
            bail!("connection.address must not be empty");
        }
        if conn.request_timeout_ms == 0 {
            bail!("connection.request_timeout_ms must be positive");
        }
        if conn.connect_timeout_ms == 0 {
            bail!("connection.connect_timeout_ms must be positive");
        }
        if conn.sweep_interval_ms == 0 {
            bail!("connection.sweep_interval_ms must be positive");
        }
        if conn.stale_factor == 0 {
            bail!("connection.stale_factor must be at least 1");
        }
        if conn.max_message_size == 0 {
            bail!("connection.max_message_size must be positive");
        }
        if conn.read_buffer_size == 0 || conn.push_channel_capacity == 0 || conn.outbound_queue_size == 0 {
            bail!("connection buffer sizes must be positive");
        }
        if self.series.retention == 0 {
            bail!("series.retention must be positive");
        }
        if self.series.update_channel_capacity == 0 {
            bail!("series.update_channel_capacity must be positive");
        }

        Ok(())
    }

    /// Render as TOML, e.g. for `--print-config`
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render settings as TOML")
    }
}

/// Load, expand and validate settings
pub fn load_settings(base_path: Option<&Path>, environment: Option<&str>) -> Result<ProxySettings> {
    let mut settings = ProxySettings::load(base_path, environment)?;
    settings.expand_env_vars()?;
    settings.validate()?;
    Ok(settings)
}
