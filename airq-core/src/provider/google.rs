use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::{
    model::{Pollutant, Pollutants, Reading, SourceId, UNAVAILABLE},
    normalize::{
        category_for_aqi, category_from_label, clamp_aqi, pollutant_or_unavailable, ppb_to_ugm3,
        representative_aqi,
    },
    provider::{parse_rfc3339, send_and_read},
};

use super::AirQualityProvider;

const DEFAULT_BASE_URL: &str = "https://airquality.googleapis.com";

const EPA_INDEX_CODE: &str = "usa_epa";
const UNIVERSAL_INDEX_CODE: &str = "uaqi";

#[derive(Debug, Clone)]
pub struct GoogleProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl GoogleProvider {
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
struct GIndex {
    code: String,
    aqi: Option<f64>,
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GConcentration {
    value: Option<f64>,
    units: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GPollutant {
    code: String,
    concentration: Option<GConcentration>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GCurrentConditions {
    date_time: Option<String>,
    #[serde(default)]
    indexes: Vec<GIndex>,
    #[serde(default)]
    pollutants: Vec<GPollutant>,
}

fn pollutant_for_code(code: &str) -> Option<Pollutant> {
    match code {
        "pm25" => Some(Pollutant::Pm25),
        "pm10" => Some(Pollutant::Pm10),
        "o3" => Some(Pollutant::O3),
        "no2" => Some(Pollutant::No2),
        "so2" => Some(Pollutant::So2),
        "co" => Some(Pollutant::Co),
        _ => None,
    }
}

/// Parse a `currentConditions:lookup` body.
///
/// The US EPA local index is preferred. The universal index runs the other way
/// (100 is best), so only its category label is used as a fallback.
pub fn parse_current_conditions(body: &str) -> Result<Reading> {
    let parsed: GCurrentConditions =
        serde_json::from_str(body).context("Failed to parse Google Air Quality JSON")?;

    let epa = parsed.indexes.iter().find(|i| i.code == EPA_INDEX_CODE);
    let universal = parsed.indexes.iter().find(|i| i.code == UNIVERSAL_INDEX_CODE);

    let aqi = match (epa.and_then(|i| i.aqi), universal.and_then(|i| i.category.as_deref())) {
        (Some(value), _) => clamp_aqi(value),
        (None, Some(label)) => representative_aqi(category_from_label(label)),
        (None, None) => UNAVAILABLE,
    };

    let mut pollutants = Pollutants::unavailable();
    for entry in &parsed.pollutants {
        let Some(pollutant) = pollutant_for_code(&entry.code) else {
            continue;
        };
        let Some(concentration) = &entry.concentration else {
            continue;
        };
        let value = match (concentration.value, concentration.units.as_deref()) {
            (Some(v), Some("PARTS_PER_BILLION")) => Some(ppb_to_ugm3(pollutant, v)),
            (value, _) => value,
        };
        pollutants.set(pollutant, pollutant_or_unavailable(value));
    }

    Ok(Reading {
        aqi,
        category: category_for_aqi(aqi),
        pollutants,
        timestamp: parsed
            .date_time
            .as_deref()
            .and_then(parse_rfc3339)
            .unwrap_or_else(Utc::now),
        source: SourceId::Google,
    })
}

#[async_trait]
impl AirQualityProvider for GoogleProvider {
    fn id(&self) -> SourceId {
        SourceId::Google
    }

    async fn fetch_reading(&self, lat: f64, lon: f64) -> Result<Reading> {
        let url = format!("{}/v1/currentConditions:lookup", self.base_url);

        let payload = json!({
            "location": { "latitude": lat, "longitude": lon },
            "extraComputations": ["LOCAL_AQI", "POLLUTANT_CONCENTRATION"],
            "customLocalAqis": [{ "regionCode": "us", "aqi": EPA_INDEX_CODE }],
        });

        let request = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload);

        let body = send_and_read(request, "Google Air Quality").await?;
        parse_current_conditions(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AqiCategory;

    #[test]
    fn prefers_epa_index_and_converts_gases() {
        let body = r#"{
            "dateTime": "2024-05-01T13:00:00Z",
            "regionCode": "us",
            "indexes": [
                {"code": "uaqi", "aqi": 71, "category": "Good air quality"},
                {"code": "usa_epa", "aqi": 64, "category": "Moderate air quality"}
            ],
            "pollutants": [
                {"code": "pm25", "concentration": {"value": 18.2, "units": "MICROGRAMS_PER_CUBIC_METER"}},
                {"code": "no2", "concentration": {"value": 24.45, "units": "PARTS_PER_BILLION"}},
                {"code": "nh3", "concentration": {"value": 3.0, "units": "PARTS_PER_BILLION"}}
            ]
        }"#;

        let reading = parse_current_conditions(body).unwrap();
        assert_eq!(reading.aqi, 64);
        assert_eq!(reading.category, AqiCategory::Moderate);
        assert_eq!(reading.pollutants.pm25, 18.2);
        assert!((reading.pollutants.no2 - 46.01).abs() < 1e-9);
        assert_eq!(reading.pollutants.co, -1.0);
        assert_eq!(reading.timestamp.to_rfc3339(), "2024-05-01T13:00:00+00:00");
    }

    #[test]
    fn universal_index_only_contributes_its_category() {
        let body = r#"{"indexes":[{"code":"uaqi","aqi":80,"category":"Excellent air quality"},
                                  {"code":"usa_epa","category":"Good air quality"}]}"#;
        let reading = parse_current_conditions(body).unwrap();
        assert_eq!(reading.aqi, -1);

        let body = r#"{"indexes":[{"code":"uaqi","aqi":40,"category":"Moderate air quality"}]}"#;
        let reading = parse_current_conditions(body).unwrap();
        assert_eq!(reading.aqi, 75);
    }
}
