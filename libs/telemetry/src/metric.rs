//! Metric configuration
//!
//! Describes how a raw counter reading becomes a displayed value: how the
//! rate is derived, the linear calibration applied to it, the unit family
//! used for scaling, and the thresholds it is judged against.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Most decimal places a formatted value may carry
pub const MAX_DECIMAL_PLACES: u8 = 6;

/// How consecutive readings relate to the displayed value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    /// Monotonic, wrapping counter; displayed as a per-second rate
    Counter,
    /// Instantaneous reading; displayed verbatim
    Gauge,
    /// Signed counter that may go down; displayed as a per-second rate
    Derive,
}

/// Bit width at which a counter wraps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum CounterWidth {
    Bits32,
    Bits64,
}

impl CounterWidth {
    pub fn bits(self) -> u32 {
        match self {
            CounterWidth::Bits32 => 32,
            CounterWidth::Bits64 => 64,
        }
    }

    /// Largest representable reading
    pub fn max_value(self) -> u64 {
        match self {
            CounterWidth::Bits32 => u32::MAX as u64,
            CounterWidth::Bits64 => u64::MAX,
        }
    }

    /// Reading truncated to this width
    #[inline]
    pub fn mask(self, value: u64) -> u64 {
        value & self.max_value()
    }

    /// Reading reinterpreted as a two's complement integer of this width
    #[inline]
    pub fn signed(self, value: u64) -> i64 {
        match self {
            CounterWidth::Bits32 => value as u32 as i32 as i64,
            CounterWidth::Bits64 => value as i64,
        }
    }
}

impl TryFrom<u8> for CounterWidth {
    type Error = String;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            32 => Ok(CounterWidth::Bits32),
            64 => Ok(CounterWidth::Bits64),
            other => Err(format!("counter width must be 32 or 64, got {}", other)),
        }
    }
}

impl From<CounterWidth> for u8 {
    fn from(width: CounterWidth) -> u8 {
        width.bits() as u8
    }
}

/// Prefix family used when scaling a value into tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitFamily {
    /// Base 1000: k, M, G, T, P
    Decimal,
    /// Base 1024: Ki, Mi, Gi, Ti, Pi
    Binary,
    /// Base 1, never scaled
    None,
}

const DECIMAL_PREFIXES: &[&str] = &["", "k", "M", "G", "T", "P"];
const BINARY_PREFIXES: &[&str] = &["", "Ki", "Mi", "Gi", "Ti", "Pi"];
const NO_PREFIXES: &[&str] = &[""];

impl UnitFamily {
    pub fn base(self) -> f64 {
        match self {
            UnitFamily::Decimal => 1000.0,
            UnitFamily::Binary => 1024.0,
            UnitFamily::None => 1.0,
        }
    }

    /// Prefix per tier, tier 0 first
    pub fn prefixes(self) -> &'static [&'static str] {
        match self {
            UnitFamily::Decimal => DECIMAL_PREFIXES,
            UnitFamily::Binary => BINARY_PREFIXES,
            UnitFamily::None => NO_PREFIXES,
        }
    }

    pub fn max_tier(self) -> usize {
        self.prefixes().len() - 1
    }
}

/// Base unit symbol plus its scaling family, e.g. `bps` scaled by 1000
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSpec {
    pub symbol: String,
    pub family: UnitFamily,
}

impl UnitSpec {
    pub fn new(symbol: impl Into<String>, family: UnitFamily) -> Self {
        Self {
            symbol: symbol.into(),
            family,
        }
    }

    /// Unscaled unit
    pub fn plain(symbol: impl Into<String>) -> Self {
        Self::new(symbol, UnitFamily::None)
    }
}

/// Warning and critical bounds
///
/// With `inverted` set, low values are bad: both the value and the bounds
/// are negated before comparing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSpec {
    #[serde(default)]
    pub warning: Option<f64>,
    #[serde(default)]
    pub critical: Option<f64>,
    #[serde(default)]
    pub inverted: bool,
}

/// Outcome of threshold classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal,
    Warning,
    Critical,
}

impl ThresholdSpec {
    pub fn new(warning: Option<f64>, critical: Option<f64>) -> Self {
        Self {
            warning,
            critical,
            inverted: false,
        }
    }

    pub fn inverted(mut self) -> Self {
        self.inverted = true;
        self
    }

    /// Critical when the critical bound is reached, else warning when the
    /// warning bound is reached. NaN is always normal.
    pub fn classify(&self, value: f64) -> Severity {
        let sign = if self.inverted { -1.0 } else { 1.0 };
        let value = value * sign;

        let crossed = |bound: Option<f64>| bound.is_some_and(|b| value >= b * sign);

        if crossed(self.critical) {
            Severity::Critical
        } else if crossed(self.warning) {
            Severity::Warning
        } else {
            Severity::Normal
        }
    }
}

/// Everything needed to turn raw readings into a displayed value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricConfig {
    pub metric_type: MetricType,

    #[serde(default = "default_width")]
    pub counter_width: CounterWidth,

    #[serde(default = "default_one")]
    pub multiplier: f64,

    #[serde(default = "default_one")]
    pub divisor: f64,

    #[serde(default)]
    pub offset: f64,

    pub unit: UnitSpec,

    /// Render at this tier instead of choosing one from the magnitude
    #[serde(default)]
    pub fixed_tier: Option<u8>,

    #[serde(default = "default_decimal_places")]
    pub decimal_places: u8,

    #[serde(default)]
    pub thresholds: Option<ThresholdSpec>,

    /// Prefix positive values with `+`
    #[serde(default)]
    pub show_plus_sign: bool,
}

fn default_width() -> CounterWidth {
    CounterWidth::Bits64
}
fn default_one() -> f64 {
    1.0
}
fn default_decimal_places() -> u8 {
    2
}

impl MetricConfig {
    pub fn new(metric_type: MetricType, unit: UnitSpec) -> Self {
        Self {
            metric_type,
            counter_width: default_width(),
            multiplier: 1.0,
            divisor: 1.0,
            offset: 0.0,
            unit,
            fixed_tier: None,
            decimal_places: default_decimal_places(),
            thresholds: None,
            show_plus_sign: false,
        }
    }

    pub fn counter(unit: UnitSpec) -> Self {
        Self::new(MetricType::Counter, unit)
    }

    pub fn gauge(unit: UnitSpec) -> Self {
        Self::new(MetricType::Gauge, unit)
    }

    pub fn derive(unit: UnitSpec) -> Self {
        Self::new(MetricType::Derive, unit)
    }

    /// 64-bit counter shown as a plain per-second rate
    pub fn generic_counter() -> Self {
        Self::counter(UnitSpec::new("/s", UnitFamily::Decimal))
    }

    pub fn with_width(mut self, width: CounterWidth) -> Self {
        self.counter_width = width;
        self
    }

    pub fn with_scale(mut self, multiplier: f64, divisor: f64) -> Self {
        self.multiplier = multiplier;
        self.divisor = divisor;
        self
    }

    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_fixed_tier(mut self, tier: u8) -> Self {
        self.fixed_tier = Some(tier);
        self
    }

    pub fn with_decimal_places(mut self, places: u8) -> Self {
        self.decimal_places = places;
        self
    }

    pub fn with_thresholds(mut self, thresholds: ThresholdSpec) -> Self {
        self.thresholds = Some(thresholds);
        self
    }

    pub fn with_plus_sign(mut self) -> Self {
        self.show_plus_sign = true;
        self
    }

    /// Linear calibration: `raw × multiplier / divisor + offset`
    #[inline]
    pub fn transform(&self, raw: f64) -> f64 {
        raw * self.multiplier / self.divisor + self.offset
    }

    /// Severity of an already transformed value
    pub fn classify(&self, value: f64) -> Severity {
        self.thresholds
            .as_ref()
            .map_or(Severity::Normal, |t| t.classify(value))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.divisor == 0.0 {
            return Err(ConfigError::ZeroDivisor);
        }
        for (field, value) in [
            ("multiplier", self.multiplier),
            ("divisor", self.divisor),
            ("offset", self.offset),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { field });
            }
        }
        if self.decimal_places > MAX_DECIMAL_PLACES {
            return Err(ConfigError::DecimalPlaces {
                places: self.decimal_places,
                max: MAX_DECIMAL_PLACES,
            });
        }
        if let Some(t) = &self.thresholds {
            let finite = |b: Option<f64>| b.map_or(true, f64::is_finite);
            if !finite(t.warning) || !finite(t.critical) {
                return Err(ConfigError::NonFinite { field: "thresholds" });
            }
        }
        Ok(())
    }
}

impl Default for MetricConfig {
    fn default() -> Self {
        Self::generic_counter()
    }
}
