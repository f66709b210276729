//! Rendering of calibrated values with scaled unit prefixes

use crate::metric::{MetricConfig, Severity};
use std::fmt;

/// A value ready for display
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedValue {
    /// Calibrated value before tier scaling
    pub value: f64,
    /// Number rendered at the chosen tier, e.g. `1.00`
    pub number: String,
    /// Tier prefix plus base symbol, e.g. `Mbps`
    pub unit: String,
    pub severity: Severity,
}

impl fmt::Display for FormattedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unit.is_empty() {
            write!(f, "{}", self.number)
        } else {
            write!(f, "{} {}", self.number, self.unit)
        }
    }
}

/// Formats raw values according to one [`MetricConfig`]
#[derive(Debug, Clone, Copy)]
pub struct MetricFormatter<'a> {
    config: &'a MetricConfig,
}

impl<'a> MetricFormatter<'a> {
    pub fn new(config: &'a MetricConfig) -> Self {
        Self { config }
    }

    /// Calibrate, scale, render and classify a raw value
    pub fn format(&self, raw: f64) -> FormattedValue {
        let value = self.config.transform(raw);
        let severity = self.config.classify(value);

        if !value.is_finite() {
            return FormattedValue {
                value,
                number: render_non_finite(value).to_string(),
                unit: self.config.unit.symbol.clone(),
                severity,
            };
        }

        let tier = self.tier_for(value);
        let family = self.config.unit.family;
        let scaled = value / family.base().powi(tier as i32);

        FormattedValue {
            value,
            number: self.render(scaled),
            unit: format!("{}{}", family.prefixes()[tier], self.config.unit.symbol),
            severity,
        }
    }

    /// Scale tier for a calibrated value
    pub fn tier_for(&self, value: f64) -> usize {
        let family = self.config.unit.family;
        let max_tier = family.max_tier();

        if let Some(fixed) = self.config.fixed_tier {
            return (fixed as usize).min(max_tier);
        }

        let base = family.base();
        let magnitude = value.abs();
        let mut tier = 0;
        while tier < max_tier && magnitude / base.powi(tier as i32 + 1) >= 1.0 {
            tier += 1;
        }
        tier
    }

    fn render(&self, scaled: f64) -> String {
        let magnitude = scaled.abs();
        let places = self.config.decimal_places as usize;
        let places = if magnitude >= 100.0 {
            places.min(1)
        } else if magnitude >= 10.0 {
            places.min(2)
        } else {
            places
        };

        let text = format!("{:.*}", places, scaled);
        let rounds_to_zero = text
            .trim_start_matches('-')
            .bytes()
            .all(|b| b == b'0' || b == b'.');

        if rounds_to_zero {
            // No sign on a value that rounds to zero
            text.trim_start_matches('-').to_string()
        } else if self.config.show_plus_sign && scaled > 0.0 {
            format!("+{}", text)
        } else {
            text
        }
    }
}

fn render_non_finite(value: f64) -> &'static str {
    if value.is_nan() {
        "NaN"
    } else if value > 0.0 {
        "∞"
    } else {
        "-∞"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::{ThresholdSpec, UnitFamily, UnitSpec};

    fn bps() -> MetricConfig {
        MetricConfig::counter(UnitSpec::new("bps", UnitFamily::Decimal))
    }

    #[test]
    fn test_megabit_scaling() {
        let config = bps();
        assert_eq!(MetricFormatter::new(&config).format(1_000_000.0).to_string(), "1.00 Mbps");
    }

    #[test]
    fn test_small_values_stay_at_base_tier() {
        let config = bps();
        let formatter = MetricFormatter::new(&config);
        assert_eq!(formatter.format(999.0).to_string(), "999.0 bps");
        assert_eq!(formatter.format(0.5).to_string(), "0.50 bps");
        assert_eq!(formatter.format(0.0).to_string(), "0.00 bps");
    }

    #[test]
    fn test_binary_family() {
        let config = MetricConfig::gauge(UnitSpec::new("B", UnitFamily::Binary));
        assert_eq!(MetricFormatter::new(&config).format(1536.0).to_string(), "1.50 KiB");
    }

    #[test]
    fn test_tier_capped_at_largest_prefix() {
        let config = bps();
        let formatter = MetricFormatter::new(&config);
        assert_eq!(formatter.tier_for(1e30), 5);
        assert_eq!(formatter.format(2e18).to_string(), "2000.0 Pbps");
    }

    #[test]
    fn test_fixed_tier_is_clamped() {
        let config = bps().with_fixed_tier(1);
        assert_eq!(MetricFormatter::new(&config).format(2_500_000.0).to_string(), "2500.0 kbps");

        let config = bps().with_fixed_tier(9);
        assert_eq!(MetricFormatter::new(&config).tier_for(1.0), 5);
    }

    #[test]
    fn test_unscaled_family_never_changes_tier() {
        let config = MetricConfig::gauge(UnitSpec::plain("%"));
        assert_eq!(MetricFormatter::new(&config).format(5000.0).to_string(), "5000.0 %");
    }

    #[test]
    fn test_decimals_reduced_for_large_magnitudes() {
        let config = bps().with_decimal_places(4);
        let formatter = MetricFormatter::new(&config);
        assert_eq!(formatter.format(1.23456).number, "1.2346");
        assert_eq!(formatter.format(12.3456).number, "12.35");
        assert_eq!(formatter.format(123.456).number, "123.5");
        assert_eq!(formatter.format(-123.456).number, "-123.5");
    }

    #[test]
    fn test_non_finite_values() {
        let config = bps();
        let formatter = MetricFormatter::new(&config);
        assert_eq!(formatter.format(f64::NAN).number, "NaN");
        assert_eq!(formatter.format(f64::INFINITY).number, "∞");
        assert_eq!(formatter.format(f64::NEG_INFINITY).number, "-∞");
    }

    #[test]
    fn test_plus_sign_only_for_positive() {
        let config = MetricConfig::derive(UnitSpec::plain("/s")).with_plus_sign();
        let formatter = MetricFormatter::new(&config);
        assert_eq!(formatter.format(5.0).number, "+5.00");
        assert_eq!(formatter.format(-5.0).number, "-5.00");
        assert_eq!(formatter.format(0.0).number, "0.00");
        assert_eq!(formatter.format(0.001).number, "0.00");
    }

    #[test]
    fn test_values_rounding_to_zero_lose_their_sign() {
        let config = MetricConfig::derive(UnitSpec::plain("/s"));
        let formatter = MetricFormatter::new(&config);
        assert_eq!(formatter.format(-0.0).number, "0.00");
        assert_eq!(formatter.format(-0.001).number, "0.00");
        assert_eq!(formatter.format(-0.006).number, "-0.01");
    }

    #[test]
    fn test_calibration_and_severity() {
        let config = bps()
            .with_scale(8.0, 1.0)
            .with_thresholds(ThresholdSpec::new(Some(500_000.0), Some(900_000.0)));
        let formatted = MetricFormatter::new(&config).format(125_000.0);
        assert_eq!(formatted.value, 1_000_000.0);
        assert_eq!(formatted.to_string(), "1.00 Mbps");
        assert_eq!(formatted.severity, Severity::Critical);
    }

    #[test]
    fn test_empty_unit_renders_number_only() {
        let config = MetricConfig::gauge(UnitSpec::plain(""));
        assert_eq!(MetricFormatter::new(&config).format(3.0).to_string(), "3.00");
    }
}
