use chrono::Utc;
use std::collections::BTreeMap;

use crate::{
    fetch::SourceOutcome,
    model::{CombinedReading, Discrepancy, Reading, SourceId, Strategy, UNAVAILABLE},
    reconcile::Reconciliation,
};

pub const NO_DATA_MESSAGE: &str = "No air quality data available from any source";

/// Assemble the caller-facing result from fetch outcomes and the merge.
///
/// `enabled` lists every source that was asked, so sources that produced no
/// outcome at all still show up as failed.
pub fn build(
    enabled: &[SourceId],
    outcomes: Vec<SourceOutcome>,
    reconciliation: &Reconciliation,
) -> CombinedReading {
    let mut sources: BTreeMap<SourceId, bool> = enabled.iter().map(|id| (*id, false)).collect();
    let mut raw_readings: BTreeMap<SourceId, Reading> = BTreeMap::new();

    for outcome in outcomes {
        sources.insert(outcome.source, outcome.result.is_ok());
        if let Ok(reading) = outcome.result {
            raw_readings.insert(outcome.source, reading);
        }
    }

    let discrepancy = match reconciliation.strategy {
        Some(strategy) if reconciliation.discrepancy_detected => Some(Discrepancy {
            detected: true,
            max_difference: reconciliation.max_difference,
            strategy,
            details: describe(reconciliation, strategy),
        }),
        _ => None,
    };

    let error = (reconciliation.aqi == UNAVAILABLE).then(|| NO_DATA_MESSAGE.to_string());

    CombinedReading {
        aqi: reconciliation.aqi,
        category: reconciliation.category,
        pollutants: reconciliation.pollutants,
        timestamp: Utc::now(),
        sources,
        confidence: reconciliation.confidence,
        discrepancy,
        raw_readings,
        error,
    }
}

fn describe(reconciliation: &Reconciliation, strategy: Strategy) -> String {
    let method = match strategy {
        Strategy::Average => "average",
        Strategy::WeightedAverage => "weighted average",
        Strategy::Median => "median",
        Strategy::FavorMajority => "most authoritative source",
    };

    format!(
        "Sources disagree by {} AQI points across {} sources; using {}",
        reconciliation.max_difference, reconciliation.valid_count, method
    )
}
