//! # Tapline Telemetry
//!
//! ## Purpose
//!
//! Turns raw counter readings from the collector into displayable values:
//! - Per-second rates with counter-wrap versus reset disambiguation
//! - Linear calibration, unit tier scaling and rendering
//! - Warning/critical threshold classification
//! - Bounded per-target series with replay on reconfiguration
//!
//! ## Architecture Role
//!
//! ```text
//! network::PushDispatcher → SamplePush → [SeriesStore] → RateCalculator
//!                                             │
//!                                             └→ MetricFormatter → "1.00 Mbps" (Warning)
//! ```
//!
//! ## Example
//!
//! ```
//! use telemetry::{MetricConfig, MetricFormatter, UnitFamily, UnitSpec};
//!
//! let config = MetricConfig::counter(UnitSpec::new("bps", UnitFamily::Decimal))
//!     .with_scale(8.0, 1.0);
//! let text = MetricFormatter::new(&config).format(125_000.0).to_string();
//! assert_eq!(text, "1.00 Mbps");
//! ```

pub mod error;
pub mod format;
pub mod metric;
pub mod oid;
pub mod rate;
pub mod series;

pub use error::{ConfigError, SeriesError, SeriesResult};
pub use format::{FormattedValue, MetricFormatter};
pub use metric::{
    CounterWidth, MetricConfig, MetricType, Severity, ThresholdSpec, UnitFamily, UnitSpec,
    MAX_DECIMAL_PLACES,
};
pub use oid::OidRegistry;
pub use rate::{RateCalculator, RateResult};
pub use series::{DisplayValue, ProcessedSample, Series, SeriesStore, SeriesUpdate};
