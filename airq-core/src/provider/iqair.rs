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

const DEFAULT_BASE_URL: &str = "https://api.airvisual.com";

#[derive(Debug, Clone)]
pub struct IqAirProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl IqAirProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
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
struct IqEnvelope {
    status: String,
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct IqPollution {
    ts: Option<String>,
    aqius: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct IqCurrent {
    pollution: IqPollution,
}

#[derive(Debug, Deserialize)]
struct IqData {
    current: IqCurrent,
}

/// Parse a `nearest_city` body. Only the US AQI is used; IQAir's free tier
/// carries no concentrations.
pub fn parse_nearest_city(body: &str) -> Result<Reading> {
    let envelope: IqEnvelope =
        serde_json::from_str(body).context("Failed to parse IQAir response JSON")?;

    if envelope.status != "success" {
        let message = envelope
            .data
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("no message");
        return Err(anyhow!("IQAir returned status '{}': {}", envelope.status, message));
    }

    let data: IqData =
        serde_json::from_value(envelope.data).context("Failed to parse IQAir pollution data")?;
    let pollution = data.current.pollution;

    let aqi = pollution.aqius.map(clamp_aqi).unwrap_or(UNAVAILABLE);
    let timestamp = pollution
        .ts
        .as_deref()
        .and_then(parse_rfc3339)
        .unwrap_or_else(Utc::now);

    Ok(Reading {
        aqi,
        category: category_for_aqi(aqi),
        pollutants: Pollutants::unavailable(),
        timestamp,
        source: SourceId::IqAir,
    })
}

#[async_trait]
impl AirQualityProvider for IqAirProvider {
    fn id(&self) -> SourceId {
        SourceId::IqAir
    }

    async fn fetch_reading(&self, lat: f64, lon: f64) -> Result<Reading> {
        let url = format!("{}/v2/nearest_city", self.base_url);

        let request = self.http.get(url).query(&[
            ("lat", lat.to_string()),
            ("lon", lon.to_string()),
            ("key", self.api_key.clone()),
        ]);

        let body = send_and_read(request, "IQAir").await?;
        parse_nearest_city(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AqiCategory;

    #[test]
    fn parses_us_aqi() {
        let body = r#"{"status":"success","data":{"city":"Oakland","current":{
            "pollution":{"ts":"2024-05-01T13:00:00.000Z","aqius":112,"mainus":"p2","aqicn":55,"maincn":"p2"}}}}"#;

        let reading = parse_nearest_city(body).unwrap();
        assert_eq!(reading.aqi, 112);
        assert_eq!(reading.category, AqiCategory::UnhealthySensitive);
        assert_eq!(reading.pollutants, Pollutants::unavailable());
        assert_eq!(reading.timestamp.to_rfc3339(), "2024-05-01T13:00:00+00:00");
    }

    #[test]
    fn failure_status_is_an_error() {
        let body = r#"{"status":"fail","data":{"message":"incorrect_api_key"}}"#;
        let err = parse_nearest_city(body).unwrap_err();
        assert!(err.to_string().contains("incorrect_api_key"));
    }

    #[test]
    fn missing_aqi_is_sentinel() {
        let body = r#"{"status":"success","data":{"current":{"pollution":{}}}}"#;
        let reading = parse_nearest_city(body).unwrap();
        assert_eq!(reading.aqi, -1);
        assert_eq!(reading.category, AqiCategory::Unknown);
    }
}
