use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    model::{Pollutants, Reading, SourceId, UNAVAILABLE},
    normalize::{category_for_aqi, clamp_aqi},
    provider::{parse_rfc3339, send_and_read},
};

use super::AirQualityProvider;

const DEFAULT_BASE_URL: &str = "https://api.waqi.info";

#[derive(Debug, Clone)]
pub struct WaqiProvider {
    token: String,
    base_url: String,
    http: Client,
}

impl WaqiProvider {
    pub fn new(token: String) -> Self {
        Self {
            token,
            base_url: DEFAULT_BASE_URL.to_string(),
            http: Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct WaqiEnvelope {
    status: String,
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct WaqiTime {
    iso: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WaqiFeed {
    /// A number, or `"-"` when the station has no current value.
    aqi: serde_json::Value,
    time: Option<WaqiTime>,
}

/// Parse a geo feed body.
///
/// The per-pollutant `iaqi` entries are sub-indices rather than concentrations,
/// so only the overall AQI is taken.
pub fn parse_feed(body: &str) -> Result<Reading> {
    let envelope: WaqiEnvelope =
        serde_json::from_str(body).context("Failed to parse WAQI response JSON")?;

    if envelope.status != "ok" {
        let message = envelope.data.as_str().unwrap_or("no message");
        return Err(anyhow!("WAQI returned status '{}': {}", envelope.status, message));
    }

    let feed: WaqiFeed =
        serde_json::from_value(envelope.data).context("Failed to parse WAQI feed data")?;

    let aqi = feed
        .aqi
        .as_f64()
        .or_else(|| feed.aqi.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
        .map(clamp_aqi)
        .unwrap_or(UNAVAILABLE);

    let timestamp = feed
        .time
        .and_then(|t| t.iso)
        .as_deref()
        .and_then(parse_rfc3339)
        .unwrap_or_else(Utc::now);

    Ok(Reading {
        aqi,
        category: category_for_aqi(aqi),
        pollutants: Pollutants::unavailable(),
        timestamp,
        source: SourceId::Waqi,
    })
}

#[async_trait]
impl AirQualityProvider for WaqiProvider {
    fn id(&self) -> SourceId {
        SourceId::Waqi
    }

    async fn fetch_reading(&self, lat: f64, lon: f64) -> Result<Reading> {
        let url = format!("{}/feed/geo:{};{}/", self.base_url, lat, lon);

        let request = self.http.get(url).query(&[("token", self.token.as_str())]);

        let body = send_and_read(request, "WAQI").await?;
        parse_feed(&body)
    }
}
