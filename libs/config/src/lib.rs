//! # Tapline Configuration
//!
//! Settings loading and default constants for the Tapline client.
//!
//! ## Features
//!
//! - **Defaults**: timeouts, buffer sizes and retention bounds in one place
//! - **Settings files**: TOML base file plus `config/environments/<env>.toml`
//! - **Environment overrides**: `TAPLINE_<SECTION>__<KEY>`, e.g.
//!   `TAPLINE_CONNECTION__ADDRESS=10.0.0.5:7411`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use config::{load_settings, defaults};
//!
//! let settings = load_settings(None, Some("production"))?;
//! assert!(settings.connection.request_timeout_ms >= 1);
//! let _ = defaults::connection::REQUEST_TIMEOUT_MS;
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! Runtime types (Durations, credentials) are derived from these settings by
//! the network crate; nothing here is global.

pub mod defaults;
pub mod settings;

pub use settings::{
    load_settings, ConnectionSettings, CredentialSettings, GlobalSettings, ProxySettings,
    SeriesSettings, TransportKind,
};
