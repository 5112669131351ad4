//! Merging of per-source readings into one best estimate.
//!
//! The AQI merge picks a strategy from a tier table keyed on how many sources
//! produced a usable AQI and how far apart those values are. Pollutants are
//! always merged with a plain mean. Weights, priority order and thresholds all
//! live in [`ReconcileConfig`], so adding a provider never touches this code.

use std::collections::BTreeMap;

use crate::{
    model::{
        AqiCategory, Confidence, Pollutant, Pollutants, Reading, SourceId, Strategy, UNAVAILABLE,
        UNAVAILABLE_F64,
    },
    normalize::{category_for_aqi, clamp_aqi},
};

/// Weight used for a source missing from the weight table.
pub const DEFAULT_WEIGHT: f64 = 0.10;

/// Spread thresholds for one tier of the strategy table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierThresholds {
    /// Spread strictly above this selects the median.
    pub median_above: f64,
    /// Spread at or above this (and not above `median_above`) selects the weighted average.
    pub weighted_from: f64,
}

impl TierThresholds {
    fn strategy_for(&self, spread: f64) -> Strategy {
        if spread > self.median_above {
            Strategy::Median
        } else if spread >= self.weighted_from {
            Strategy::WeightedAverage
        } else {
            Strategy::Average
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileConfig {
    /// Relative reliability per source; renormalized over the sources present.
    pub weights: BTreeMap<SourceId, f64>,
    /// Authority order used when two sources diverge sharply.
    pub priority: Vec<SourceId>,
    /// Number of enabled sources; drives the majority threshold.
    pub total_sources: usize,
    pub majority: TierThresholds,
    pub trio: TierThresholds,
    /// Spread above which a pair of sources is resolved by priority.
    pub pair_divergence: f64,
    /// Spread above which a discrepancy is reported, whatever the tier.
    pub discrepancy_flag: f64,
}

impl ReconcileConfig {
    pub fn new(total_sources: usize) -> Self {
        Self {
            weights: default_weights(),
            priority: default_priority(),
            total_sources,
            majority: TierThresholds {
                median_above: 60.0,
                weighted_from: 40.0,
            },
            trio: TierThresholds {
                median_above: 50.0,
                weighted_from: 30.0,
            },
            pair_divergence: 50.0,
            discrepancy_flag: 30.0,
        }
    }

    pub fn with_weights(mut self, weights: BTreeMap<SourceId, f64>) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_priority(mut self, priority: Vec<SourceId>) -> Self {
        self.priority = priority;
        self
    }

    /// Sources needed for the majority tier: 4 of 5, 5 of 6, never fewer than 4.
    pub fn majority_threshold(&self) -> usize {
        self.total_sources.saturating_sub(1).max(4)
    }

    fn weight(&self, id: SourceId) -> f64 {
        self.weights.get(&id).copied().unwrap_or(DEFAULT_WEIGHT)
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self::new(SourceId::all().len())
    }
}

pub fn default_weights() -> BTreeMap<SourceId, f64> {
    BTreeMap::from([
        (SourceId::AirNow, 0.30),
        (SourceId::PurpleAir, 0.25),
        (SourceId::IqAir, 0.15),
        (SourceId::Waqi, 0.10),
        (SourceId::OpenWeather, 0.10),
        (SourceId::Google, 0.10),
    ])
}

pub fn default_priority() -> Vec<SourceId> {
    vec![
        SourceId::AirNow,
        SourceId::IqAir,
        SourceId::PurpleAir,
        SourceId::Waqi,
        SourceId::OpenWeather,
    ]
}

/// Outcome of merging the successful readings.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub aqi: i32,
    pub category: AqiCategory,
    pub pollutants: Pollutants,
    /// `None` when fewer than two sources had a usable AQI.
    pub strategy: Option<Strategy>,
    pub max_difference: f64,
    pub discrepancy_detected: bool,
    pub valid_count: usize,
    pub success_count: usize,
    pub confidence: Confidence,
}

/// Merge the readings of every source whose call succeeded.
pub fn reconcile(readings: &[Reading], config: &ReconcileConfig) -> Reconciliation {
    let valid: Vec<(SourceId, f64)> = readings
        .iter()
        .filter(|r| r.has_aqi())
        .map(|r| (r.source, r.aqi as f64))
        .collect();

    let max_difference = spread(&valid);
    let discrepancy_detected = valid.len() >= 2 && max_difference > config.discrepancy_flag;

    let (merged, strategy) = match valid.as_slice() {
        [] => (None, None),
        [(_, only)] => (Some(*only), None),
        _ => {
            let strategy = select_strategy(valid.len(), max_difference, config);
            (Some(apply_strategy(strategy, &valid, config)), Some(strategy))
        }
    };

    let aqi = merged.map(clamp_aqi).unwrap_or(UNAVAILABLE);

    let success_count = readings.len();
    let confidence = classify_confidence(
        aqi,
        success_count,
        discrepancy_detected,
        strategy,
        config.majority_threshold(),
    );

    tracing::debug!(
        valid = valid.len(),
        success = success_count,
        max_difference,
        ?strategy,
        aqi,
        %confidence,
        "reconciled readings"
    );

    Reconciliation {
        aqi,
        category: category_for_aqi(aqi),
        pollutants: merge_pollutants(readings),
        strategy,
        max_difference,
        discrepancy_detected,
        valid_count: valid.len(),
        success_count,
        confidence,
    }
}

fn spread(valid: &[(SourceId, f64)]) -> f64 {
    let mut values = valid.iter().map(|(_, v)| *v);
    let Some(first) = values.next() else {
        return 0.0;
    };
    let (min, max) = values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
    max - min
}

fn select_strategy(valid_count: usize, spread: f64, config: &ReconcileConfig) -> Strategy {
    if valid_count >= config.majority_threshold() {
        config.majority.strategy_for(spread)
    } else if valid_count >= 3 {
        config.trio.strategy_for(spread)
    } else if spread > config.pair_divergence {
        Strategy::FavorMajority
    } else {
        Strategy::WeightedAverage
    }
}

fn apply_strategy(strategy: Strategy, valid: &[(SourceId, f64)], config: &ReconcileConfig) -> f64 {
    match strategy {
        Strategy::Average => mean(valid.iter().map(|(_, v)| *v)),
        Strategy::Median => median(valid),
        // A pair below the divergence threshold is averaged evenly.
        Strategy::WeightedAverage if valid.len() <= 2 => mean(valid.iter().map(|(_, v)| *v)),
        Strategy::WeightedAverage => weighted_average(valid, config),
        Strategy::FavorMajority => favored_value(valid, &config.priority),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

fn median(valid: &[(SourceId, f64)]) -> f64 {
    let mut values: Vec<f64> = valid.iter().map(|(_, v)| *v).collect();
    values.sort_by(f64::total_cmp);

    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

fn weighted_average(valid: &[(SourceId, f64)], config: &ReconcileConfig) -> f64 {
    let total_weight: f64 = valid.iter().map(|(id, _)| config.weight(*id)).sum();
    if total_weight <= 0.0 {
        return mean(valid.iter().map(|(_, v)| *v));
    }

    valid
        .iter()
        .map(|(id, v)| v * config.weight(*id) / total_weight)
        .sum()
}

fn favored_value(valid: &[(SourceId, f64)], priority: &[SourceId]) -> f64 {
    priority
        .iter()
        .find_map(|id| valid.iter().find(|(source, _)| source == id))
        .or_else(|| valid.first())
        .map(|(_, v)| *v)
        .unwrap_or(UNAVAILABLE_F64)
}

/// Plain mean per pollutant over every non-negative value, rounded.
pub fn merge_pollutants(readings: &[Reading]) -> Pollutants {
    let mut merged = Pollutants::unavailable();

    for pollutant in Pollutant::all() {
        let values: Vec<f64> = readings
            .iter()
            .map(|r| r.pollutants.get(*pollutant))
            .filter(|v| *v >= 0.0)
            .collect();

        if !values.is_empty() {
            merged.set(*pollutant, mean(values.into_iter()).round());
        }
    }

    merged
}

/// Decision table mapping source counts and disagreement onto a trust label.
///
/// Keyed on successful calls, not usable AQI values: five successes where only
/// one carried an AQI still rate `High`.
pub fn classify_confidence(
    aqi: i32,
    success_count: usize,
    discrepancy_detected: bool,
    strategy: Option<Strategy>,
    majority_threshold: usize,
) -> Confidence {
    if aqi < 0 {
        return Confidence::Low;
    }

    match success_count {
        0 => Confidence::Low,
        1 => Confidence::Medium,
        n if !discrepancy_detected => {
            if n >= majority_threshold {
                Confidence::High
            } else {
                Confidence::Medium
            }
        }
        _ if strategy == Some(Strategy::Median) => Confidence::Medium,
        _ => Confidence::Conflicting,
    }
}
