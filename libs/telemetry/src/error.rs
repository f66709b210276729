//! Errors for metric configuration and series bookkeeping

use thiserror::Error;
use types::TargetId;

/// A metric configuration that cannot be applied
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Divisor must be non-zero")]
    ZeroDivisor,

    #[error("{field} must be a finite number")]
    NonFinite { field: &'static str },

    #[error("Decimal places {places} out of range (max {max})")]
    DecimalPlaces { places: u8, max: u8 },
}

impl ConfigError {
    pub fn category(&self) -> &'static str {
        match self {
            ConfigError::ZeroDivisor => "zero_divisor",
            ConfigError::NonFinite { .. } => "non_finite",
            ConfigError::DecimalPlaces { .. } => "decimal_places",
        }
    }
}

/// Series store errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SeriesError {
    #[error("No series for target {target_id}")]
    UnknownTarget { target_id: TargetId },

    /// Sample does not advance the series clock
    #[error("Out-of-order sample for target {target_id}: timestamp {timestamp_ns} is not after newest {newest_ns}")]
    OutOfOrder {
        target_id: TargetId,
        timestamp_ns: u64,
        newest_ns: u64,
    },

    #[error("Retention for target {target_id} must be at least 1 (got {retention})")]
    InvalidRetention { target_id: TargetId, retention: usize },

    #[error("Invalid metric configuration: {0}")]
    Config(#[from] ConfigError),
}

impl SeriesError {
    pub fn category(&self) -> &'static str {
        match self {
            SeriesError::UnknownTarget { .. } => "unknown_target",
            SeriesError::OutOfOrder { .. } => "out_of_order",
            SeriesError::InvalidRetention { .. } => "invalid_retention",
            SeriesError::Config(_) => "config",
        }
    }
}

pub type SeriesResult<T> = std::result::Result<T, SeriesError>;
