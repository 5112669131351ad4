use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    error::FetchError,
    model::{Reading, SourceId},
    provider::AirQualityProvider,
};

/// Result of querying one enabled source.
#[derive(Debug)]
pub struct SourceOutcome {
    pub source: SourceId,
    pub result: Result<Reading, FetchError>,
}

impl SourceOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// A source slot: either a ready adapter or the reason it could not be built.
#[derive(Debug, Clone)]
enum Slot {
    Ready(Arc<dyn AirQualityProvider>),
    Unconfigured(SourceId),
}

/// Queries every enabled source concurrently and waits for all of them to settle.
///
/// One failing or panicking adapter never cancels or delays the others.
#[derive(Debug, Clone, Default)]
pub struct FanOutFetcher {
    slots: Vec<Slot>,
}

impl FanOutFetcher {
    pub fn new(providers: Vec<Arc<dyn AirQualityProvider>>) -> Self {
        Self {
            slots: providers.into_iter().map(Slot::Ready).collect(),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn AirQualityProvider>) -> Self {
        self.slots.push(Slot::Ready(provider));
        self
    }

    /// Register an enabled source whose credentials are missing; it always fails.
    pub fn with_unconfigured(mut self, source: SourceId) -> Self {
        self.slots.push(Slot::Unconfigured(source));
        self
    }

    /// Enabled sources, in registration order.
    pub fn sources(&self) -> Vec<SourceId> {
        self.slots
            .iter()
            .map(|slot| match slot {
                Slot::Ready(p) => p.id(),
                Slot::Unconfigured(id) => *id,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Fetch from every source, returning outcomes in registration order.
    pub async fn fetch_all(&self, lat: f64, lon: f64) -> Vec<SourceOutcome> {
        let futures = self.slots.iter().cloned().map(|slot| async move {
            match slot {
                Slot::Unconfigured(source) => SourceOutcome {
                    source,
                    result: Err(FetchError::ConfigurationMissing(source)),
                },
                Slot::Ready(provider) => {
                    let source = provider.id();
                    let handle =
                        tokio::spawn(async move { provider.fetch_reading(lat, lon).await });

                    let result = match handle.await {
                        Ok(Ok(reading)) => Ok(reading),
                        Ok(Err(error)) => Err(FetchError::ProviderUnavailable {
                            source_id: source,
                            error,
                        }),
                        Err(join_err) => Err(FetchError::TaskFailed {
                            source_id: source,
                            message: join_err.to_string(),
                        }),
                    };

                    SourceOutcome { source, result }
                }
            }
        });

        let outcomes = join_all(futures).await;

        for outcome in &outcomes {
            match &outcome.result {
                Ok(reading) => debug!(source = %outcome.source, aqi = reading.aqi, "source succeeded"),
                Err(err) => warn!(source = %err.source_id(), "{err}"),
            }
        }

        outcomes
    }
}
