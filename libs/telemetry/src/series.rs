//! Per-target series storage
//!
//! ## Flow
//!
//! ```text
//! Sample ─► SeriesStore::add_sample ─► RateCalculator(prev, cur, dt) ─► ProcessedSample
//!                                                                         │
//!                           FIFO eviction past retention ◄────────────────┘
//!                                        │
//!                           broadcast::Sender<SeriesUpdate>
//! ```
//!
//! Samples in a series are strictly timestamp-ascending. The cached current
//! value is the computed value of the newest sample, so a counter reset
//! shows no value until the next interval completes.

use crate::error::{SeriesError, SeriesResult};
use crate::format::{FormattedValue, MetricFormatter};
use crate::metric::{MetricConfig, MetricType};
use crate::oid::OidRegistry;
use crate::rate::{RateCalculator, RateResult};
use config::SeriesSettings;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use types::{current_timestamp_ns, ns_to_secs, Sample, TargetId, TargetInfo};

/// One stored reading and the value computed for it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessedSample {
    pub timestamp_ns: u64,
    pub raw: u64,
    /// Rate (or gauge value) before calibration; `None` when not computable
    pub rate: Option<f64>,
}

/// Change notifications for observers of the store
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesUpdate {
    Sample {
        target_id: TargetId,
        timestamp_ns: u64,
        value: Option<f64>,
    },
    /// Config or OID changed and stored values were recomputed
    Reconfigured { target_id: TargetId },
    HistoryLoaded { target_id: TargetId, appended: usize },
    /// Collector reported the target as unreadable
    Failed { target_id: TargetId, error: String },
    Removed { target_id: TargetId },
}

#[derive(Debug, Clone)]
pub struct Series {
    pub target_id: TargetId,
    pub display_name: String,
    pub oid: String,
    config: MetricConfig,
    samples: VecDeque<ProcessedSample>,
    retention: usize,
    current: Option<f64>,
    last_error: Option<String>,
}

impl Series {
    fn new(target_id: TargetId, display_name: String, oid: String, config: MetricConfig, retention: usize) -> Self {
        Self {
            target_id,
            display_name,
            oid,
            config,
            samples: VecDeque::new(),
            retention,
            current: None,
            last_error: None,
        }
    }

    pub fn config(&self) -> &MetricConfig {
        &self.config
    }

    pub fn samples(&self) -> impl Iterator<Item = &ProcessedSample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    pub fn current(&self) -> Option<f64> {
        self.current
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn calculator(&self) -> RateCalculator {
        RateCalculator::new(self.config.metric_type, self.config.counter_width)
    }

    /// Value for `current` given the reading before it
    fn value_for(&self, current: (u64, u64), previous: Option<(u64, u64)>) -> Option<f64> {
        let (ts, raw) = current;
        let Some((prev_ts, prev_raw)) = previous else {
            // Gauges need no history
            return (self.config.metric_type == MetricType::Gauge).then_some(raw as f64);
        };

        match self.calculator().compute(raw, prev_raw, ns_to_secs(prev_ts, ts)) {
            RateResult::Value(v) => Some(v),
            RateResult::CounterReset => {
                warn!(
                    target_id = self.target_id,
                    previous = prev_raw,
                    current = raw,
                    "Counter reset detected, skipping interval"
                );
                None
            }
            RateResult::InvalidInterval => None,
        }
    }

    fn append(&mut self, sample: &Sample) -> SeriesResult<Option<f64>> {
        if let Some(newest) = self.samples.back() {
            if sample.timestamp_ns <= newest.timestamp_ns {
                return Err(SeriesError::OutOfOrder {
                    target_id: self.target_id,
                    timestamp_ns: sample.timestamp_ns,
                    newest_ns: newest.timestamp_ns,
                });
            }
        }

        let previous = self.samples.back().map(|s| (s.timestamp_ns, s.raw));
        let rate = self.value_for((sample.timestamp_ns, sample.value), previous);

        self.samples.push_back(ProcessedSample {
            timestamp_ns: sample.timestamp_ns,
            raw: sample.value,
            rate,
        });
        self.evict();
        self.current = rate;
        self.last_error = None;
        Ok(rate)
    }

    fn evict(&mut self) {
        while self.samples.len() > self.retention {
            self.samples.pop_front();
        }
    }

    /// Recompute every stored value pairwise from the raw readings
    fn replay(&mut self) {
        let mut previous = None;
        for i in 0..self.samples.len() {
            let s = self.samples[i];
            let rate = self.value_for((s.timestamp_ns, s.raw), previous);
            self.samples[i].rate = rate;
            previous = Some((s.timestamp_ns, s.raw));
        }
        self.current = self.samples.back().and_then(|s| s.rate);
    }

    fn window(&self, duration: Duration, now_ns: u64) -> Vec<ProcessedSample> {
        let cutoff = now_ns.saturating_sub(duration.as_nanos().min(u64::MAX as u128) as u64);
        let start = self.samples.partition_point(|s| s.timestamp_ns < cutoff);
        self.samples.range(start..).copied().collect()
    }
}

/// Current value of a series, formatted for display
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayValue {
    pub target_id: TargetId,
    pub display_name: String,
    pub formatted: FormattedValue,
}

/// All series for one client, keyed by target
pub struct SeriesStore {
    series: RwLock<HashMap<TargetId, Series>>,
    registry: OidRegistry,
    default_retention: usize,
    updates: broadcast::Sender<SeriesUpdate>,
}

impl SeriesStore {
    pub fn new(default_retention: usize, update_capacity: usize) -> Self {
        Self::with_registry(OidRegistry::builtin().clone(), default_retention, update_capacity)
    }

    pub fn with_registry(registry: OidRegistry, default_retention: usize, update_capacity: usize) -> Self {
        let (updates, _) = broadcast::channel(update_capacity.max(1));
        Self {
            series: RwLock::new(HashMap::new()),
            registry,
            default_retention: default_retention.max(1),
            updates,
        }
    }

    pub fn from_settings(settings: &SeriesSettings) -> Self {
        Self::new(settings.retention, settings.update_channel_capacity)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SeriesUpdate> {
        self.updates.subscribe()
    }

    fn publish(&self, update: SeriesUpdate) {
        // No receivers is fine
        let _ = self.updates.send(update);
    }

    /// Create the series for a catalogued target, or refresh its name and OID
    ///
    /// A changed OID re-selects the config from the registry and replays
    /// stored samples under it.
    pub fn register_target(&self, info: &TargetInfo) {
        let reconfigured = {
            let mut series = self.series.write();
            match series.get_mut(&info.target_id) {
                Some(existing) => {
                    existing.display_name = info.display_name.clone();
                    if existing.oid != info.oid {
                        existing.oid = info.oid.clone();
                        existing.config = self.registry.lookup(&info.oid);
                        existing.replay();
                        true
                    } else {
                        false
                    }
                }
                None => {
                    let config = self.registry.lookup(&info.oid);
                    debug!(
                        target_id = info.target_id,
                        oid = %info.oid,
                        metric_type = ?config.metric_type,
                        "Registered series"
                    );
                    series.insert(
                        info.target_id,
                        Series::new(
                            info.target_id,
                            info.display_name.clone(),
                            info.oid.clone(),
                            config,
                            self.default_retention,
                        ),
                    );
                    false
                }
            }
        };

        if reconfigured {
            self.publish(SeriesUpdate::Reconfigured {
                target_id: info.target_id,
            });
        }
    }

    fn series_entry<'a>(&self, series: &'a mut HashMap<TargetId, Series>, target_id: TargetId) -> &'a mut Series {
        series.entry(target_id).or_insert_with(|| {
            Series::new(
                target_id,
                format!("target {}", target_id),
                String::new(),
                self.registry.lookup(""),
                self.default_retention,
            )
        })
    }

    /// Ingest one reading, returning the series' new current value
    ///
    /// Invalid samples record their error on the series and are not stored.
    pub fn add_sample(&self, target_id: TargetId, sample: &Sample) -> SeriesResult<Option<f64>> {
        let result = {
            let mut series = self.series.write();
            let entry = self.series_entry(&mut series, target_id);

            if !sample.valid {
                let error = sample
                    .error
                    .clone()
                    .unwrap_or_else(|| "invalid sample".to_string());
                entry.last_error = Some(error.clone());
                Err(error)
            } else {
                Ok(entry.append(sample)?)
            }
        };

        match result {
            Ok(value) => {
                self.publish(SeriesUpdate::Sample {
                    target_id,
                    timestamp_ns: sample.timestamp_ns,
                    value,
                });
                Ok(value)
            }
            Err(error) => {
                debug!(target_id, error = %error, "Invalid sample recorded");
                self.publish(SeriesUpdate::Failed { target_id, error });
                Ok(None)
            }
        }
    }

    /// Bulk ingest, skipping invalid and out-of-order samples
    pub fn load_history(&self, target_id: TargetId, samples: &[Sample]) -> usize {
        let appended = {
            let mut series = self.series.write();
            let entry = self.series_entry(&mut series, target_id);

            let mut appended = 0;
            for sample in samples.iter().filter(|s| s.valid) {
                if entry.append(sample).is_ok() {
                    appended += 1;
                }
            }
            appended
        };

        debug!(target_id, appended, offered = samples.len(), "Loaded history");
        self.publish(SeriesUpdate::HistoryLoaded { target_id, appended });
        appended
    }

    /// Replace the config and recompute every stored value under it
    pub fn update_config(&self, target_id: TargetId, config: MetricConfig) -> SeriesResult<()> {
        config.validate()?;
        {
            let mut series = self.series.write();
            let entry = series
                .get_mut(&target_id)
                .ok_or(SeriesError::UnknownTarget { target_id })?;
            entry.config = config;
            entry.replay();
        }
        self.publish(SeriesUpdate::Reconfigured { target_id });
        Ok(())
    }

    /// Retention override for one series, applied immediately
    pub fn set_retention(&self, target_id: TargetId, retention: usize) -> SeriesResult<()> {
        if retention == 0 {
            return Err(SeriesError::InvalidRetention {
                target_id,
                retention,
            });
        }
        let mut series = self.series.write();
        let entry = series
            .get_mut(&target_id)
            .ok_or(SeriesError::UnknownTarget { target_id })?;
        entry.retention = retention;
        entry.evict();
        Ok(())
    }

    pub fn remove_series(&self, target_id: TargetId) -> bool {
        let removed = self.series.write().remove(&target_id).is_some();
        if removed {
            self.publish(SeriesUpdate::Removed { target_id });
        }
        removed
    }

    /// Samples no older than `duration` before now
    pub fn window_query(&self, target_id: TargetId, duration: Duration) -> SeriesResult<Vec<ProcessedSample>> {
        self.window_query_at(target_id, duration, current_timestamp_ns())
    }

    /// Samples with timestamp ≥ `now_ns - duration`
    pub fn window_query_at(
        &self,
        target_id: TargetId,
        duration: Duration,
        now_ns: u64,
    ) -> SeriesResult<Vec<ProcessedSample>> {
        let series = self.series.read();
        let entry = series
            .get(&target_id)
            .ok_or(SeriesError::UnknownTarget { target_id })?;
        Ok(entry.window(duration, now_ns))
    }

    /// Formatted current value with its severity
    pub fn display(&self, target_id: TargetId) -> Option<DisplayValue> {
        let series = self.series.read();
        let entry = series.get(&target_id)?;
        let current = entry.current?;

        Some(DisplayValue {
            target_id,
            display_name: entry.display_name.clone(),
            formatted: MetricFormatter::new(&entry.config).format(current),
        })
    }

    pub fn latest(&self, target_id: TargetId) -> Option<ProcessedSample> {
        self.series.read().get(&target_id)?.samples.back().copied()
    }

    pub fn series(&self, target_id: TargetId) -> Option<Series> {
        self.series.read().get(&target_id).cloned()
    }

    pub fn series_ids(&self) -> Vec<TargetId> {
        let mut ids: Vec<_> = self.series.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn default_retention(&self) -> usize {
        self.default_retention
    }
}

impl Default for SeriesStore {
    fn default() -> Self {
        Self::new(
            config::defaults::series::RETENTION,
            config::defaults::series::UPDATE_CHANNEL_CAPACITY,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::{CounterWidth, Severity, ThresholdSpec, UnitFamily, UnitSpec};

    const SEC: u64 = 1_000_000_000;

    fn counter_store() -> SeriesStore {
        SeriesStore::with_registry(OidRegistry::new(), 100, 16)
    }

    fn info(target_id: TargetId, oid: &str) -> TargetInfo {
        TargetInfo {
            target_id,
            display_name: format!("target {}", target_id),
            address: "10.0.0.1".to_string(),
            oid: oid.to_string(),
            interval_ms: 1000,
            enabled: true,
            last_error: None,
        }
    }

    #[test]
    fn test_counter_needs_two_samples() {
        let store = counter_store();
        assert_eq!(store.add_sample(1, &Sample::new(1, 10 * SEC, 900)).unwrap(), None);
        assert_eq!(store.add_sample(1, &Sample::new(1, 20 * SEC, 1000)).unwrap(), Some(10.0));
        assert_eq!(store.latest(1).unwrap().rate, Some(10.0));
    }

    #[test]
    fn test_gauge_first_sample_passes_through() {
        let store = counter_store();
        store.register_target(&info(1, ""));
        store
            .update_config(1, MetricConfig::gauge(UnitSpec::plain("%")))
            .unwrap();
        assert_eq!(store.add_sample(1, &Sample::new(1, SEC, 42)).unwrap(), Some(42.0));
    }

    #[test]
    fn test_retention_bound_evicts_oldest() {
        let store = SeriesStore::with_registry(OidRegistry::new(), 10, 16);
        for i in 0..15u64 {
            store.add_sample(1, &Sample::new(1, (i + 1) * SEC, i * 100)).unwrap();
        }

        let series = store.series(1).unwrap();
        assert_eq!(series.len(), 10);
        assert_eq!(series.samples().next().unwrap().timestamp_ns, 6 * SEC);
        assert_eq!(series.current(), Some(100.0));
    }

    #[test]
    fn test_out_of_order_sample_rejected() {
        let store = counter_store();
        store.add_sample(1, &Sample::new(1, 10 * SEC, 5)).unwrap();

        let err = store.add_sample(1, &Sample::new(1, 10 * SEC, 6)).unwrap_err();
        assert_eq!(err.category(), "out_of_order");
        assert!(store.add_sample(1, &Sample::new(1, 5 * SEC, 6)).is_err());
        assert_eq!(store.series(1).unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_sample_records_error() {
        let store = counter_store();
        store.add_sample(1, &Sample::new(1, SEC, 5)).unwrap();
        let value = store
            .add_sample(1, &Sample::invalid(1, 2 * SEC, "timeout polling agent"))
            .unwrap();

        assert_eq!(value, None);
        let series = store.series(1).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.last_error(), Some("timeout polling agent"));

        store.add_sample(1, &Sample::new(1, 3 * SEC, 15)).unwrap();
        assert_eq!(store.series(1).unwrap().last_error(), None);
    }

    #[test]
    fn test_counter_reset_yields_no_value() {
        let store = counter_store();
        store.register_target(&info(1, ""));
        store
            .update_config(1, MetricConfig::generic_counter().with_width(CounterWidth::Bits32))
            .unwrap();

        store.add_sample(1, &Sample::new(1, SEC, 1000)).unwrap();
        assert_eq!(store.add_sample(1, &Sample::new(1, 2 * SEC, 10)).unwrap(), None);
        assert_eq!(store.add_sample(1, &Sample::new(1, 3 * SEC, 30)).unwrap(), Some(20.0));
    }

    #[test]
    fn test_update_config_replays_every_rate() {
        let store = counter_store();
        store.register_target(&info(1, ""));
        for (i, raw) in [100u64, 200, 400, 800].iter().enumerate() {
            store
                .add_sample(1, &Sample::new(1, (i as u64 + 1) * SEC, *raw))
                .unwrap();
        }
        let before: Vec<_> = store.series(1).unwrap().samples().map(|s| s.rate).collect();
        assert_eq!(before, vec![None, Some(100.0), Some(200.0), Some(400.0)]);

        store
            .update_config(1, MetricConfig::gauge(UnitSpec::plain("")))
            .unwrap();
        let after: Vec<_> = store.series(1).unwrap().samples().map(|s| s.rate).collect();
        assert_eq!(after, vec![Some(100.0), Some(200.0), Some(400.0), Some(800.0)]);
        assert_eq!(store.series(1).unwrap().current(), Some(800.0));
    }

    #[test]
    fn test_counter_to_derive_recovers_backward_steps() {
        let store = counter_store();
        store.register_target(&info(1, ""));
        for (i, raw) in [100u64, 50, 80, 20].iter().enumerate() {
            store
                .add_sample(1, &Sample::new(1, (i as u64 + 1) * SEC, *raw))
                .unwrap();
        }
        let before: Vec<_> = store.series(1).unwrap().samples().map(|s| s.rate).collect();
        assert_eq!(before, vec![None, None, Some(30.0), None]);

        store
            .update_config(1, MetricConfig::derive(UnitSpec::plain("/s")))
            .unwrap();
        let after: Vec<_> = store.series(1).unwrap().samples().map(|s| s.rate).collect();
        assert_eq!(after, vec![None, Some(-50.0), Some(30.0), Some(-60.0)]);
        assert_eq!(store.series(1).unwrap().current(), Some(-60.0));
    }

    #[test]
    fn test_update_config_validates_and_requires_series() {
        let store = counter_store();
        let bad = MetricConfig::generic_counter().with_scale(1.0, 0.0);
        store.register_target(&info(1, ""));
        assert!(matches!(
            store.update_config(1, bad),
            Err(SeriesError::Config(_))
        ));
        assert_eq!(
            store.update_config(2, MetricConfig::generic_counter()),
            Err(SeriesError::UnknownTarget { target_id: 2 })
        );
    }

    #[test]
    fn test_window_query_returns_suffix() {
        let store = counter_store();
        for i in 1..=10u64 {
            store.add_sample(1, &Sample::new(1, i * SEC, i)).unwrap();
        }

        let window = store
            .window_query_at(1, Duration::from_secs(3), 10 * SEC)
            .unwrap();
        let stamps: Vec<_> = window.iter().map(|s| s.timestamp_ns / SEC).collect();
        assert_eq!(stamps, vec![7, 8, 9, 10]);

        // Read-only
        assert_eq!(store.series(1).unwrap().len(), 10);
        assert!(store.window_query(9, Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_register_target_selects_config_by_oid() {
        let store = SeriesStore::new(100, 16);
        store.register_target(&info(1, "1.3.6.1.2.1.2.2.1.10.3"));
        let series = store.series(1).unwrap();
        assert_eq!(series.config().unit, UnitSpec::new("bps", UnitFamily::Decimal));
        assert_eq!(series.config().counter_width, CounterWidth::Bits32);
    }

    #[test]
    fn test_register_target_with_new_oid_replays() {
        let store = SeriesStore::new(100, 16);
        let mut updates = store.subscribe();
        store.register_target(&info(1, "1.3.6.1.2.1.2.2.1.10.3"));
        store.add_sample(1, &Sample::new(1, SEC, 0)).unwrap();
        store.add_sample(1, &Sample::new(1, 2 * SEC, 1000)).unwrap();
        assert_eq!(store.series(1).unwrap().current(), Some(1000.0));

        let mut renamed = info(1, "1.3.6.1.2.1.25.3.3.1.2.1");
        renamed.display_name = "cpu0".to_string();
        store.register_target(&renamed);

        let series = store.series(1).unwrap();
        assert_eq!(series.display_name, "cpu0");
        assert_eq!(series.config().metric_type, MetricType::Gauge);
        assert_eq!(series.current(), Some(1000.0));

        let mut saw_reconfigure = false;
        while let Ok(update) = updates.try_recv() {
            saw_reconfigure |= update == SeriesUpdate::Reconfigured { target_id: 1 };
        }
        assert!(saw_reconfigure);
    }

    #[test]
    fn test_load_history_skips_bad_samples() {
        let store = counter_store();
        let samples = vec![
            Sample::new(1, SEC, 100),
            Sample::new(1, 2 * SEC, 200),
            Sample::new(1, 2 * SEC, 250),
            Sample::invalid(1, 3 * SEC, "unreachable"),
            Sample::new(1, 4 * SEC, 400),
        ];
        assert_eq!(store.load_history(1, &samples), 3);
        assert_eq!(store.latest(1).unwrap().rate, Some(100.0));
    }

    #[test]
    fn test_set_retention_evicts_immediately() {
        let store = counter_store();
        for i in 1..=20u64 {
            store.add_sample(1, &Sample::new(1, i * SEC, i)).unwrap();
        }
        store.set_retention(1, 5).unwrap();
        assert_eq!(store.series(1).unwrap().len(), 5);
        assert!(matches!(
            store.set_retention(1, 0),
            Err(SeriesError::InvalidRetention { .. })
        ));
    }

    #[test]
    fn test_display_formats_current_value() {
        let store = counter_store();
        store.register_target(&info(1, ""));
        let config = MetricConfig::counter(UnitSpec::new("bps", UnitFamily::Decimal))
            .with_scale(8.0, 1.0)
            .with_thresholds(ThresholdSpec::new(Some(500_000.0), None));
        store.update_config(1, config).unwrap();

        assert!(store.display(1).is_none());
        store.add_sample(1, &Sample::new(1, SEC, 0)).unwrap();
        store.add_sample(1, &Sample::new(1, 2 * SEC, 125_000)).unwrap();

        let display = store.display(1).unwrap();
        assert_eq!(display.formatted.to_string(), "1.00 Mbps");
        assert_eq!(display.formatted.severity, Severity::Warning);
        assert_eq!(display.display_name, "target 1");
    }

    #[test]
    fn test_remove_and_ids() {
        let store = counter_store();
        store.add_sample(3, &Sample::new(3, SEC, 1)).unwrap();
        store.add_sample(1, &Sample::new(1, SEC, 1)).unwrap();
        assert_eq!(store.series_ids(), vec![1, 3]);

        assert!(store.remove_series(3));
        assert!(!store.remove_series(3));
        assert_eq!(store.series_ids(), vec![1]);
    }

    #[test]
    fn test_updates_are_broadcast() {
        let store = counter_store();
        let mut updates = store.subscribe();
        store.add_sample(1, &Sample::new(1, SEC, 1)).unwrap();

        assert_eq!(
            updates.try_recv().unwrap(),
            SeriesUpdate::Sample {
                target_id: 1,
                timestamp_ns: SEC,
                value: None
            }
        );
    }
}
