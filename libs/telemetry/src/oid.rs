//! OID prefix registry
//!
//! Picks a starting [`MetricConfig`] for a new series from its OID. Entries
//! are matched on whole dotted components and the longest matching prefix
//! wins, so a table-wide entry can be refined per column.

use crate::metric::{CounterWidth, MetricConfig, ThresholdSpec, UnitFamily, UnitSpec};
use once_cell::sync::Lazy;

/// Well-known MIB-II and HOST-RESOURCES objects
static BUILTIN: Lazy<OidRegistry> = Lazy::new(|| {
    let octets32 = MetricConfig::counter(UnitSpec::new("bps", UnitFamily::Decimal))
        .with_width(CounterWidth::Bits32)
        .with_scale(8.0, 1.0);
    let octets64 = octets32.clone().with_width(CounterWidth::Bits64);
    let packets32 = MetricConfig::counter(UnitSpec::new("pps", UnitFamily::Decimal))
        .with_width(CounterWidth::Bits32);
    let errors32 = MetricConfig::counter(UnitSpec::plain("err/s"))
        .with_width(CounterWidth::Bits32)
        .with_thresholds(ThresholdSpec::new(Some(1.0), Some(10.0)));

    let mut registry = OidRegistry::new();
    registry
        // ifTable, any column
        .insert(
            "1.3.6.1.2.1.2.2.1",
            MetricConfig::counter(UnitSpec::new("/s", UnitFamily::Decimal))
                .with_width(CounterWidth::Bits32),
        )
        .insert("1.3.6.1.2.1.2.2.1.10", octets32.clone()) // ifInOctets
        .insert("1.3.6.1.2.1.2.2.1.16", octets32) // ifOutOctets
        .insert("1.3.6.1.2.1.2.2.1.11", packets32.clone()) // ifInUcastPkts
        .insert("1.3.6.1.2.1.2.2.1.17", packets32) // ifOutUcastPkts
        .insert("1.3.6.1.2.1.2.2.1.14", errors32.clone()) // ifInErrors
        .insert("1.3.6.1.2.1.2.2.1.20", errors32) // ifOutErrors
        .insert("1.3.6.1.2.1.31.1.1.1.6", octets64.clone()) // ifHCInOctets
        .insert("1.3.6.1.2.1.31.1.1.1.10", octets64) // ifHCOutOctets
        .insert(
            "1.3.6.1.2.1.1.3", // sysUpTime, in hundredths of a second
            MetricConfig::gauge(UnitSpec::plain("s"))
                .with_scale(1.0, 100.0)
                .with_decimal_places(0),
        )
        .insert(
            "1.3.6.1.2.1.25.3.3.1.2", // hrProcessorLoad
            MetricConfig::gauge(UnitSpec::plain("%"))
                .with_decimal_places(0)
                .with_thresholds(ThresholdSpec::new(Some(80.0), Some(95.0))),
        );
    registry
});

#[derive(Debug, Clone, Default)]
pub struct OidRegistry {
    entries: Vec<(String, MetricConfig)>,
}

impl OidRegistry {
    /// Empty registry; every lookup falls back to the generic counter
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> &'static OidRegistry {
        &BUILTIN
    }

    /// Add or replace the config for an OID prefix
    pub fn insert(&mut self, prefix: impl Into<String>, config: MetricConfig) -> &mut Self {
        let prefix = normalize(&prefix.into()).to_string();
        match self.entries.iter_mut().find(|(p, _)| *p == prefix) {
            Some(entry) => entry.1 = config,
            None => self.entries.push((prefix, config)),
        }
        self
    }

    /// Longest registered prefix of `oid`, with its config
    pub fn find(&self, oid: &str) -> Option<(&str, &MetricConfig)> {
        let oid = normalize(oid);
        self.entries
            .iter()
            .filter(|(prefix, _)| is_component_prefix(prefix, oid))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(prefix, config)| (prefix.as_str(), config))
    }

    /// Config for `oid`, or the generic counter when nothing matches
    pub fn lookup(&self, oid: &str) -> MetricConfig {
        self.find(oid)
            .map(|(_, config)| config.clone())
            .unwrap_or_else(MetricConfig::generic_counter)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Strip the leading dot some tools print
fn normalize(oid: &str) -> &str {
    oid.trim().trim_start_matches('.')
}

fn is_component_prefix(prefix: &str, oid: &str) -> bool {
    !prefix.is_empty()
        && oid.starts_with(prefix)
        && (oid.len() == prefix.len() || oid.as_bytes()[prefix.len()] == b'.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::MetricType;

    #[test]
    fn test_longest_prefix_wins() {
        let registry = OidRegistry::builtin();

        let (prefix, config) = registry.find("1.3.6.1.2.1.2.2.1.10.3").unwrap();
        assert_eq!(prefix, "1.3.6.1.2.1.2.2.1.10");
        assert_eq!(config.unit.symbol, "bps");

        let (prefix, _) = registry.find("1.3.6.1.2.1.2.2.1.5.3").unwrap();
        assert_eq!(prefix, "1.3.6.1.2.1.2.2.1");
    }

    #[test]
    fn test_match_respects_component_boundaries() {
        let registry = OidRegistry::builtin();
        // .100 is not a child of .10
        let (prefix, _) = registry.find("1.3.6.1.2.1.2.2.1.100.1").unwrap();
        assert_eq!(prefix, "1.3.6.1.2.1.2.2.1");
    }

    #[test]
    fn test_leading_dot_is_ignored() {
        let config = OidRegistry::builtin().lookup(".1.3.6.1.2.1.31.1.1.1.6.2");
        assert_eq!(config.counter_width, CounterWidth::Bits64);
        assert_eq!(config.multiplier, 8.0);
    }

    #[test]
    fn test_unknown_oid_falls_back_to_generic_counter() {
        let config = OidRegistry::builtin().lookup("1.3.6.1.4.1.9999.1");
        assert_eq!(config, MetricConfig::generic_counter());
        assert_eq!(OidRegistry::new().lookup(""), MetricConfig::generic_counter());
    }

    #[test]
    fn test_insert_replaces_existing_prefix() {
        let mut registry = OidRegistry::new();
        registry.insert("1.2.3", MetricConfig::generic_counter());
        registry.insert(".1.2.3", MetricConfig::gauge(UnitSpec::plain("V")));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("1.2.3.4").metric_type, MetricType::Gauge);
    }
}
