//! Runtime client configuration
//!
//! Settings files speak milliseconds and plain strings; the session works
//! with `Duration`s. Both the config and the credentials are injected when a
//! session is built.

use config::{defaults, ConnectionSettings, CredentialSettings};
use std::fmt;
use std::time::Duration;
use types::AuthenticateRequest;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Per-request response deadline
    pub request_timeout: Duration,
    /// Deadline for transport establishment
    pub connect_timeout: Duration,
    /// Period of the stale-request sweep
    pub sweep_interval: Duration,
    /// Age past which the sweep force-fails a pending request
    pub stale_threshold: Duration,
    pub max_message_size: usize,
    pub read_buffer_size: usize,
    pub push_channel_capacity: usize,
    pub outbound_queue_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_settings(&ConnectionSettings::default())
    }
}

impl ClientConfig {
    pub fn from_settings(settings: &ConnectionSettings) -> Self {
        let request_timeout = Duration::from_millis(settings.request_timeout_ms);
        Self {
            request_timeout,
            connect_timeout: Duration::from_millis(settings.connect_timeout_ms),
            sweep_interval: Duration::from_millis(settings.sweep_interval_ms),
            stale_threshold: request_timeout * settings.stale_factor.max(1),
            max_message_size: settings.max_message_size,
            read_buffer_size: settings.read_buffer_size.max(1),
            push_channel_capacity: settings.push_channel_capacity.max(1),
            outbound_queue_size: settings.outbound_queue_size.max(1),
        }
    }

    /// Override the request timeout, keeping the stale threshold at the default factor
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self.stale_threshold = timeout * defaults::connection::STALE_FACTOR;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_max_message_size(mut self, max: usize) -> Self {
        self.max_message_size = max;
        self
    }
}

/// Identity presented in the authentication step
#[derive(Clone, Default)]
pub struct Credentials {
    pub token: String,
    pub client_name: String,
}

impl Credentials {
    pub fn new(token: impl Into<String>, client_name: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            client_name: client_name.into(),
        }
    }

    pub fn from_settings(settings: &CredentialSettings) -> Self {
        Self::new(settings.token.clone(), settings.client_name.clone())
    }

    pub(crate) fn to_request(&self) -> AuthenticateRequest {
        AuthenticateRequest {
            token: self.token.clone(),
            client_name: self.client_name.clone(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("client_name", &self.client_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.sweep_interval, Duration::from_secs(5));
        assert_eq!(config.stale_threshold, Duration::from_secs(60));
    }

    #[test]
    fn test_stale_threshold_follows_request_timeout() {
        let config = ClientConfig::default().with_request_timeout(Duration::from_millis(250));
        assert_eq!(config.stale_threshold, Duration::from_millis(500));
    }
}
