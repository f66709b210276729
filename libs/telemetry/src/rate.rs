//! Rate computation between two consecutive readings
//!
//! Counters wrap at their configured width. A backwards step is read as a
//! wrap only when that is the more plausible explanation: if stepping back
//! naively is shorter than half the wrapped distance, the device most
//! likely restarted its counter and no rate is produced for that interval.

use crate::metric::{CounterWidth, MetricType};

/// Result of comparing two readings
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateResult {
    /// Per-second rate, or the gauge reading itself
    Value(f64),
    /// Counter went backwards by less than half its wrap distance
    CounterReset,
    /// Interval between the readings is zero, negative or not finite
    InvalidInterval,
}

impl RateResult {
    pub fn value(self) -> Option<f64> {
        match self {
            RateResult::Value(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateCalculator {
    metric_type: MetricType,
    width: CounterWidth,
}

impl RateCalculator {
    pub fn new(metric_type: MetricType, width: CounterWidth) -> Self {
        Self { metric_type, width }
    }

    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    /// Compare `current` against `previous`, taken `dt_secs` earlier
    pub fn compute(&self, current: u64, previous: u64, dt_secs: f64) -> RateResult {
        if !dt_secs.is_finite() || dt_secs <= 0.0 {
            return RateResult::InvalidInterval;
        }

        match self.metric_type {
            MetricType::Gauge => RateResult::Value(current as f64),
            MetricType::Counter => self.counter_rate(current, previous, dt_secs),
            MetricType::Derive => {
                let delta = self.width.signed(current) as i128 - self.width.signed(previous) as i128;
                RateResult::Value(delta as f64 / dt_secs)
            }
        }
    }

    fn counter_rate(&self, current: u64, previous: u64, dt_secs: f64) -> RateResult {
        let current = self.width.mask(current) as u128;
        let previous = self.width.mask(previous) as u128;

        if current >= previous {
            return RateResult::Value((current - previous) as f64 / dt_secs);
        }

        let wrapped = (self.width.max_value() as u128 - previous) + current + 1;
        let naive_backward = previous - current;

        // naive_backward < wrapped / 2, kept in integers
        if naive_backward * 2 < wrapped {
            return RateResult::CounterReset;
        }
        RateResult::Value(wrapped as f64 / dt_secs)
    }
}
