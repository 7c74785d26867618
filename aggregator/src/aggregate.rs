//! Per-variable window accumulators
//!
//! An [`Aggregator`] folds `(value, duration)` samples into a single value per
//! window. Two reductions are supported:
//!
//! - **time-weighted mean**: `Σ(value·duration) / Σ(duration)`. A value held
//!   for 10 s counts ten times as much as one held for 1 s.
//! - **time-weighted majority**: the value with the largest accumulated
//!   duration. Ties go to the smallest value in [`ScalarValue::total_cmp`]
//!   order, so the result never depends on insertion order.
//!
//! Aggregators are reset, not reallocated, on every tier flush.

use std::collections::BTreeMap;
use timestrata_shared::{AggregationMode, OrderedValue, ScalarValue, VariableDescriptor};

#[derive(Debug, Clone)]
enum Accumulator {
    Mean {
        weighted_sum: f64,
        total_duration: f64,
    },
    Majority {
        duration_by_value: BTreeMap<OrderedValue, f64>,
    },
}

impl Accumulator {
    fn empty(mode: AggregationMode) -> Self {
        match mode {
            AggregationMode::TimeWeightedMean => Self::Mean {
                weighted_sum: 0.0,
                total_duration: 0.0,
            },
            AggregationMode::TimeWeightedMajority => Self::Majority {
                duration_by_value: BTreeMap::new(),
            },
        }
    }
}

/// Accumulator for one variable within one tier.
#[derive(Debug, Clone)]
pub struct Aggregator {
    mode: AggregationMode,
    acc: Accumulator,
    sample_count: u64,
}

impl Aggregator {
    pub fn new(mode: AggregationMode) -> Self {
        Self {
            mode,
            acc: Accumulator::empty(mode),
            sample_count: 0,
        }
    }

    pub fn for_variable(variable: &VariableDescriptor) -> Self {
        Self::new(variable.aggregation_mode())
    }

    pub fn mode(&self) -> AggregationMode {
        self.mode
    }

    /// Number of samples folded in since the last reset.
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    /// Fold in one sample held for `duration` seconds.
    ///
    /// Null values and non-positive durations are ignored. In mean mode,
    /// values without a finite numeric reading are ignored as well.
    pub fn add_value(&mut self, value: Option<&ScalarValue>, duration: f64) {
        let Some(value) = value else { return };
        if !(duration > 0.0) {
            return;
        }

        match &mut self.acc {
            Accumulator::Mean {
                weighted_sum,
                total_duration,
            } => {
                let Some(v) = value.as_f64().filter(|v| v.is_finite()) else {
                    return;
                };
                *weighted_sum += v * duration;
                *total_duration += duration;
            }
            Accumulator::Majority { duration_by_value } => {
                *duration_by_value
                    .entry(OrderedValue(value.clone()))
                    .or_insert(0.0) += duration;
            }
        }
        self.sample_count += 1;
    }

    /// Aggregated value without touching the state.
    pub fn current_value(&self) -> Option<ScalarValue> {
        if self.sample_count == 0 {
            return None;
        }
        match &self.acc {
            Accumulator::Mean {
                weighted_sum,
                total_duration,
            } => Some(ScalarValue::Real(weighted_sum / total_duration)),
            Accumulator::Majority { duration_by_value } => {
                let mut best: Option<(&OrderedValue, f64)> = None;
                // Ascending key order plus strict comparison keeps the
                // smallest value on ties.
                for (value, &duration) in duration_by_value {
                    match best {
                        Some((_, best_duration)) if duration <= best_duration => {}
                        _ => best = Some((value, duration)),
                    }
                }
                best.map(|(value, _)| value.0.clone())
            }
        }
    }

    /// Aggregated value, `None` when no sample was added since the last reset.
    /// With `reset`, the state is cleared as part of the same call.
    pub fn get_aggregated_value(&mut self, reset: bool) -> Option<ScalarValue> {
        let value = self.current_value();
        if reset {
            self.reset();
        }
        value
    }

    pub fn reset(&mut self) {
        self.acc = Accumulator::empty(self.mode);
        self.sample_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn real(v: f64) -> ScalarValue {
        ScalarValue::Real(v)
    }

    fn mean_of(v: Option<ScalarValue>) -> f64 {
        v.and_then(|v| v.as_f64()).unwrap()
    }

    #[test]
    fn test_mean_uniform_durations() {
        let mut agg = Aggregator::new(AggregationMode::TimeWeightedMean);
        for v in [1.0, 2.0, 3.0, 6.0] {
            agg.add_value(Some(&real(v)), 1.0);
        }
        assert!((mean_of(agg.get_aggregated_value(false)) - 3.0).abs() < 1e-12);
        assert_eq!(agg.sample_count(), 4);
    }

    #[test]
    fn test_mean_weighted_toward_longer_sample() {
        let mut agg = Aggregator::new(AggregationMode::TimeWeightedMean);
        agg.add_value(Some(&real(10.0)), 2.0);
        agg.add_value(Some(&real(40.0)), 1.0);
        // (10*2 + 40*1) / 3 = 20, not the plain mean 25
        assert!((mean_of(agg.get_aggregated_value(true)) - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_majority_longest_duration_wins() {
        let mut agg = Aggregator::new(AggregationMode::TimeWeightedMajority);
        agg.add_value(Some(&ScalarValue::from("B")), 3.0);
        agg.add_value(Some(&ScalarValue::from("A")), 2.0);
        agg.add_value(Some(&ScalarValue::from("C")), 1.0);
        agg.add_value(Some(&ScalarValue::from("A")), 3.0);
        assert_eq!(agg.get_aggregated_value(false), Some(ScalarValue::from("A")));
    }

    #[test]
    fn test_majority_tie_breaks_on_smallest_value() {
        let mut agg = Aggregator::new(AggregationMode::TimeWeightedMajority);
        agg.add_value(Some(&ScalarValue::from("on")), 2.0);
        agg.add_value(Some(&ScalarValue::from("auto")), 2.0);
        assert_eq!(agg.get_aggregated_value(false), Some(ScalarValue::from("auto")));

        let mut numeric = Aggregator::new(AggregationMode::TimeWeightedMajority);
        numeric.add_value(Some(&ScalarValue::Integer(7)), 1.5);
        numeric.add_value(Some(&ScalarValue::Integer(3)), 1.5);
        assert_eq!(numeric.get_aggregated_value(false), Some(ScalarValue::Integer(3)));
    }

    #[test]
    fn test_null_and_non_positive_duration_ignored() {
        let mut agg = Aggregator::new(AggregationMode::TimeWeightedMean);
        agg.add_value(None, 5.0);
        agg.add_value(Some(&real(1.0)), 0.0);
        agg.add_value(Some(&real(1.0)), -2.0);
        assert_eq!(agg.sample_count(), 0);
        assert_eq!(agg.get_aggregated_value(false), None);
    }

    #[test]
    fn test_reset_returns_value_then_null() {
        let mut agg = Aggregator::new(AggregationMode::TimeWeightedMajority);
        agg.add_value(Some(&ScalarValue::Integer(1)), 1.0);
        assert_eq!(agg.get_aggregated_value(true), Some(ScalarValue::Integer(1)));
        assert_eq!(agg.sample_count(), 0);
        assert_eq!(agg.get_aggregated_value(true), None);
    }

    #[test]
    fn test_read_without_reset_keeps_state() {
        let mut agg = Aggregator::new(AggregationMode::TimeWeightedMean);
        agg.add_value(Some(&real(4.0)), 1.0);
        assert!(agg.get_aggregated_value(false).is_some());
        agg.add_value(Some(&real(8.0)), 1.0);
        assert!((mean_of(agg.get_aggregated_value(false)) - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_mean_skips_text_and_nan() {
        let mut agg = Aggregator::new(AggregationMode::TimeWeightedMean);
        agg.add_value(Some(&ScalarValue::from("warm")), 1.0);
        agg.add_value(Some(&real(f64::NAN)), 1.0);
        assert_eq!(agg.get_aggregated_value(false), None);
    }
}
