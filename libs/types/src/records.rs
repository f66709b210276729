//! Domain records carried inside payloads

use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-assigned identifier of a monitored target
pub type TargetId = u64;

/// Credentials presented during the authentication step
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticateRequest {
    pub token: String,
    pub client_name: String,
    pub client_version: String,
}

// Token stays out of logs.
impl fmt::Debug for AuthenticateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticateRequest")
            .field("token", &"<redacted>")
            .field("client_name", &self.client_name)
            .field("client_version", &self.client_version)
            .finish()
    }
}

/// Request to start polling a new target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub address: String,
    pub oid: String,
    pub display_name: String,
    pub interval_ms: u32,
}

/// Target as known to the collector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetInfo {
    pub target_id: TargetId,
    pub display_name: String,
    pub address: String,
    pub oid: String,
    pub interval_ms: u32,
    pub enabled: bool,
    pub last_error: Option<String>,
}

/// Partial update to an existing target; `None` fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetUpdate {
    pub target_id: TargetId,
    pub display_name: Option<String>,
    pub interval_ms: Option<u32>,
    pub enabled: Option<bool>,
}

/// One raw poll result
///
/// `value` is the counter or gauge reading exactly as the device reported
/// it. When `valid` is false the poll failed and `error` says why; `value`
/// carries no meaning in that case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub target_id: TargetId,
    pub timestamp_ns: u64,
    pub value: u64,
    pub valid: bool,
    pub error: Option<String>,
}

impl Sample {
    pub fn new(target_id: TargetId, timestamp_ns: u64, value: u64) -> Self {
        Self {
            target_id,
            timestamp_ns,
            value,
            valid: true,
            error: None,
        }
    }

    pub fn invalid(target_id: TargetId, timestamp_ns: u64, error: impl Into<String>) -> Self {
        Self {
            target_id,
            timestamp_ns,
            value: 0,
            valid: false,
            error: Some(error.into()),
        }
    }
}

/// Samples delivered together in one push
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleBatch {
    pub samples: Vec<Sample>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRequest {
    pub target_id: TargetId,
    /// Only samples at or after this timestamp; 0 for everything retained
    pub since_ns: u64,
    /// Maximum samples to return; 0 for no limit
    pub limit: u32,
}

/// Stored samples for one target, oldest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryBatch {
    pub target_id: TargetId,
    pub samples: Vec<Sample>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub version: String,
    pub uptime_secs: u64,
    pub target_count: u32,
    pub session_count: u32,
    pub polling_paused: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatusUpdate {
    pub polling_paused: bool,
}

/// Per-session parameters negotiated with the collector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: u64,
    pub client_name: String,
    pub server_version: String,
    pub push_interval_ms: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfoUpdate {
    pub client_name: Option<String>,
    pub push_interval_ms: Option<u32>,
}

/// Collector-wide polling configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub default_interval_ms: u32,
    pub poll_timeout_ms: u32,
    pub max_targets: u32,
    pub history_retention: u32,
}

/// Error reply from the collector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: i32,
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_debug_redacts_token() {
        let auth = AuthenticateRequest {
            token: "s3cret".to_string(),
            client_name: "monitor".to_string(),
            client_version: "0.1.0".to_string(),
        };
        let text = format!("{:?}", auth);
        assert!(!text.contains("s3cret"));
        assert!(text.contains("monitor"));
    }

    #[test]
    fn test_invalid_sample_carries_error() {
        let sample = Sample::invalid(3, 100, "timeout");
        assert!(!sample.valid);
        assert_eq!(sample.error.as_deref(), Some("timeout"));
        assert!(Sample::new(3, 100, 42).valid);
    }
}
