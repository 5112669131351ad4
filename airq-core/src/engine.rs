use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::{
    builder,
    config::Config,
    error::FetchError,
    fetch::FanOutFetcher,
    model::{CombinedReading, Reading},
    provider::{AirQualityProvider, provider_from_config},
    reconcile::{ReconcileConfig, reconcile},
};

/// Entry point: fan out to every enabled source, merge, and report.
///
/// Holds only read-only configuration, so one engine can serve any number of
/// concurrent `combine` calls.
#[derive(Debug, Clone)]
pub struct AirQualityEngine {
    fetcher: FanOutFetcher,
    config: ReconcileConfig,
}

impl AirQualityEngine {
    pub fn new(providers: Vec<Arc<dyn AirQualityProvider>>, config: ReconcileConfig) -> Self {
        Self {
            fetcher: FanOutFetcher::new(providers),
            config,
        }
    }

    pub fn with_fetcher(fetcher: FanOutFetcher, config: ReconcileConfig) -> Self {
        Self { fetcher, config }
    }

    /// Build adapters for every enabled source. Sources without credentials stay
    /// enabled and are reported as failed on every call.
    pub fn from_config(config: &Config) -> Result<Self> {
        let reconcile_config = config.reconcile_config()?;
        let mut fetcher = FanOutFetcher::default();

        for id in config.enabled_source_ids()? {
            fetcher = match provider_from_config(id, config) {
                Ok(provider) => fetcher.with_provider(provider),
                Err(FetchError::ConfigurationMissing(source)) => {
                    fetcher.with_unconfigured(source)
                }
                Err(other) => return Err(other.into()),
            };
        }

        Ok(Self::with_fetcher(fetcher, reconcile_config))
    }

    pub fn reconcile_config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Combine every enabled source's reading for a coordinate.
    ///
    /// Never fails: missing data is reported through `aqi == -1` and `error`.
    pub async fn combine(&self, lat: f64, lon: f64) -> CombinedReading {
        let enabled = self.fetcher.sources();
        let outcomes = self.fetcher.fetch_all(lat, lon).await;

        let readings: Vec<Reading> = outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().cloned())
            .collect();

        let reconciliation = reconcile(&readings, &self.config);
        let combined = builder::build(&enabled, outcomes, &reconciliation);

        info!(
            lat,
            lon,
            enabled = enabled.len(),
            succeeded = reconciliation.success_count,
            aqi = combined.aqi,
            confidence = %combined.confidence,
            "combined air quality"
        );

        combined
    }
}
