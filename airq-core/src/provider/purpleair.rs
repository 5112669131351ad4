use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    model::{Pollutants, Reading, SourceId, UNAVAILABLE},
    normalize::{aqi_from_pm10, aqi_from_pm25, category_for_aqi},
    provider::{send_and_read, unix_to_utc},
};

use super::AirQualityProvider;

const DEFAULT_BASE_URL: &str = "https://api.purpleair.com";

/// Half-width, in degrees, of the box searched around the coordinate.
const SEARCH_BOX_DEGREES: f64 = 0.05;

/// Only outdoor sensors that reported within the last hour.
const MAX_AGE_SECONDS: &str = "3600";

const PM25_FIELD: &str = "pm2.5_atm";
const PM10_FIELD: &str = "pm10.0_atm";

#[derive(Debug, Clone)]
pub struct PurpleAirProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl PurpleAirProvider {
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

/// Columnar response: `fields` names the columns of every row in `data`.
#[derive(Debug, Deserialize)]
struct PaSensorsResponse {
    data_time_stamp: Option<i64>,
    fields: Vec<String>,
    data: Vec<Vec<serde_json::Value>>,
}

impl PaSensorsResponse {
    fn column_mean(&self, field: &str) -> Option<f64> {
        let idx = self.fields.iter().position(|f| f == field)?;

        let values: Vec<f64> = self
            .data
            .iter()
            .filter_map(|row| row.get(idx).and_then(|v| v.as_f64()))
            .filter(|v| v.is_finite() && *v >= 0.0)
            .collect();

        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    }
}

/// Parse a sensors body and average the particulate readings of every sensor in it.
///
/// The AQI comes from PM2.5 when any sensor reports it, else from PM10.
pub fn parse_sensors(body: &str) -> Result<Reading> {
    let parsed: PaSensorsResponse =
        serde_json::from_str(body).context("Failed to parse PurpleAir sensors JSON")?;

    if parsed.data.is_empty() {
        return Err(anyhow!("PurpleAir returned no sensors near this location"));
    }

    let pm25 = parsed.column_mean(PM25_FIELD);
    let pm10 = parsed.column_mean(PM10_FIELD);

    let aqi = match (pm25, pm10) {
        (Some(c), _) => aqi_from_pm25(c),
        (None, Some(c)) => aqi_from_pm10(c),
        (None, None) => UNAVAILABLE,
    };

    let mut pollutants = Pollutants::unavailable();
    if let Some(c) = pm25 {
        pollutants.pm25 = c;
    }
    if let Some(c) = pm10 {
        pollutants.pm10 = c;
    }

    Ok(Reading {
        aqi,
        category: category_for_aqi(aqi),
        pollutants,
        timestamp: parsed
            .data_time_stamp
            .and_then(unix_to_utc)
            .unwrap_or_else(Utc::now),
        source: SourceId::PurpleAir,
    })
}

#[async_trait]
impl AirQualityProvider for PurpleAirProvider {
    fn id(&self) -> SourceId {
        SourceId::PurpleAir
    }

    async fn fetch_reading(&self, lat: f64, lon: f64) -> Result<Reading> {
        let url = format!("{}/v1/sensors", self.base_url);

        let request = self
            .http
            .get(url)
            .header("X-API-Key", &self.api_key)
            .query(&[
                ("fields", format!("{PM25_FIELD},{PM10_FIELD}")),
                ("location_type", "0".to_string()),
                ("max_age", MAX_AGE_SECONDS.to_string()),
                ("nwlat", (lat + SEARCH_BOX_DEGREES).to_string()),
                ("nwlng", (lon - SEARCH_BOX_DEGREES).to_string()),
                ("selat", (lat - SEARCH_BOX_DEGREES).to_string()),
                ("selng", (lon + SEARCH_BOX_DEGREES).to_string()),
            ]);

        let body = send_and_read(request, "PurpleAir").await?;
        parse_sensors(&body)
    }
}
