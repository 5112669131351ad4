use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    model::{Pollutants, Reading, SourceId},
    normalize::{aqi_from_tier, category_for_aqi, pollutant_or_unavailable},
    provider::{send_and_read, unix_to_utc},
};

use super::AirQualityProvider;

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
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
struct OwMain {
    aqi: u8,
}

/// Concentrations in µg/m³.
#[derive(Debug, Deserialize)]
struct OwComponents {
    co: Option<f64>,
    no2: Option<f64>,
    o3: Option<f64>,
    so2: Option<f64>,
    pm2_5: Option<f64>,
    pm10: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwEntry {
    dt: i64,
    main: OwMain,
    components: OwComponents,
}

#[derive(Debug, Deserialize)]
struct OwAirPollutionResponse {
    list: Vec<OwEntry>,
}

/// Parse an `air_pollution` body. The 1..=5 index is mapped onto the canonical scale.
pub fn parse_air_pollution(body: &str) -> Result<Reading> {
    let parsed: OwAirPollutionResponse =
        serde_json::from_str(body).context("Failed to parse OpenWeather air pollution JSON")?;

    let entry = parsed
        .list
        .first()
        .ok_or_else(|| anyhow!("OpenWeather air pollution response contained no data"))?;

    let aqi = aqi_from_tier(entry.main.aqi);
    let c = &entry.components;

    Ok(Reading {
        aqi,
        category: category_for_aqi(aqi),
        pollutants: Pollutants {
            pm25: pollutant_or_unavailable(c.pm2_5),
            pm10: pollutant_or_unavailable(c.pm10),
            o3: pollutant_or_unavailable(c.o3),
            no2: pollutant_or_unavailable(c.no2),
            so2: pollutant_or_unavailable(c.so2),
            co: pollutant_or_unavailable(c.co),
        },
        timestamp: unix_to_utc(entry.dt).unwrap_or_else(Utc::now),
        source: SourceId::OpenWeather,
    })
}

#[async_trait]
impl AirQualityProvider for OpenWeatherProvider {
    fn id(&self) -> SourceId {
        SourceId::OpenWeather
    }

    async fn fetch_reading(&self, lat: f64, lon: f64) -> Result<Reading> {
        let url = format!("{}/data/2.5/air_pollution", self.base_url);

        let request = self.http.get(url).query(&[
            ("lat", lat.to_string()),
            ("lon", lon.to_string()),
            ("appid", self.api_key.clone()),
        ]);

        let body = send_and_read(request, "OpenWeather").await?;
        parse_air_pollution(&body)
    }
}
