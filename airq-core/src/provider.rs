use crate::{
    Config, Reading, SourceId,
    error::FetchError,
    provider::{
        airnow::AirNowProvider, google::GoogleProvider, iqair::IqAirProvider,
        openweather::OpenWeatherProvider, purpleair::PurpleAirProvider, waqi::WaqiProvider,
    },
};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::RequestBuilder;
use std::{fmt::Debug, sync::Arc};

pub mod airnow;
pub mod google;
pub mod iqair;
pub mod openweather;
pub mod purpleair;
pub mod waqi;

/// Contract every vendor adapter honours.
///
/// `fetch_reading` fails on any error instead of returning a placeholder, and
/// reports every field the vendor does not supply as `-1`.
#[async_trait]
pub trait AirQualityProvider: Send + Sync + Debug {
    fn id(&self) -> SourceId;

    async fn fetch_reading(&self, lat: f64, lon: f64) -> Result<Reading>;
}

/// Construct an adapter for `id` using the credential stored in `config`.
pub fn provider_from_config(
    id: SourceId,
    config: &Config,
) -> Result<Arc<dyn AirQualityProvider>, FetchError> {
    let api_key = config
        .provider_api_key(id)
        .ok_or(FetchError::ConfigurationMissing(id))?
        .to_owned();

    let provider: Arc<dyn AirQualityProvider> = match id {
        SourceId::AirNow => Arc::new(AirNowProvider::new(api_key)),
        SourceId::IqAir => Arc::new(IqAirProvider::new(api_key)),
        SourceId::PurpleAir => Arc::new(PurpleAirProvider::new(api_key)),
        SourceId::Waqi => Arc::new(WaqiProvider::new(api_key)),
        SourceId::OpenWeather => Arc::new(OpenWeatherProvider::new(api_key)),
        SourceId::Google => Arc::new(GoogleProvider::new(api_key)),
    };

    Ok(provider)
}

/// Send a request and return the body, turning non-2xx statuses into errors.
pub(crate) async fn send_and_read(request: RequestBuilder, vendor: &str) -> Result<String> {
    let res = request
        .send()
        .await
        .with_context(|| format!("Failed to send request to {vendor}"))?;

    let status = res.status();
    let body = res
        .text()
        .await
        .with_context(|| format!("Failed to read {vendor} response body"))?;

    if !status.is_success() {
        return Err(anyhow!(
            "{vendor} request failed with status {}: {}",
            status,
            truncate_body(&body),
        ));
    }

    Ok(body)
}

pub(crate) fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

pub(crate) fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_from_config_errors_when_missing_api_key() {
        let cfg = Config::default();
        let err = provider_from_config(SourceId::AirNow, &cfg).unwrap_err();
        assert!(matches!(err, FetchError::ConfigurationMissing(SourceId::AirNow)));
        assert!(err.to_string().contains("No API key configured for source 'airnow'"));
    }

    #[test]
    fn provider_from_config_builds_every_source() {
        let mut cfg = Config::default();
        for id in SourceId::all() {
            cfg.upsert_provider_api_key(*id, "KEY".to_string());
        }

        for id in SourceId::all() {
            let provider = provider_from_config(*id, &cfg).expect("configured source");
            assert_eq!(provider.id(), *id);
        }
    }

    #[test]
    fn truncate_body_limits_long_bodies() {
        let long = "x".repeat(500);
        let out = truncate_body(&long);
        assert_eq!(out.len(), 203);
        assert!(out.ends_with("..."));
        assert_eq!(truncate_body("short"), "short");
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "µ".repeat(300);
        let out = truncate_body(&long);
        assert_eq!(out.chars().count(), 203);
    }

    #[test]
    fn parse_rfc3339_normalizes_to_utc() {
        let dt = parse_rfc3339("2024-05-01T15:00:00+02:00").unwrap();
        assert_eq!(dt, unix_to_utc(1_714_568_400).unwrap());
        assert!(parse_rfc3339("yesterday").is_none());
    }
}
