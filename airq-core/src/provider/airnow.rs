use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::{
    model::{Pollutants, Reading, SourceId, UNAVAILABLE},
    normalize::{category_for_aqi, category_from_label, clamp_aqi, representative_aqi},
    provider::send_and_read,
};

use super::AirQualityProvider;

const DEFAULT_BASE_URL: &str = "https://www.airnowapi.org";

/// Search radius, in miles, for the nearest reporting area.
const SEARCH_DISTANCE_MILES: &str = "25";

#[derive(Debug, Clone)]
pub struct AirNowProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl AirNowProvider {
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
#[serde(rename_all = "PascalCase")]
struct AnCategory {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AnObservation {
    date_observed: Option<String>,
    hour_observed: Option<u32>,
    local_time_zone: Option<String>,
    parameter_name: String,
    #[serde(rename = "AQI")]
    aqi: i32,
    category: Option<AnCategory>,
}

impl AnObservation {
    fn canonical_aqi(&self) -> i32 {
        if self.aqi >= 0 {
            return clamp_aqi(self.aqi as f64);
        }
        self.category
            .as_ref()
            .and_then(|c| c.name.as_deref())
            .map(|name| representative_aqi(category_from_label(name)))
            .unwrap_or(UNAVAILABLE)
    }

    /// `DateObserved` plus `HourObserved`, in the reporting area's local zone.
    fn observed_at(&self) -> Option<DateTime<Utc>> {
        let date = self.date_observed.as_deref()?.trim();
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
        let local = date.and_hms_opt(self.hour_observed?, 0, 0)?;
        let offset = zone_offset(self.local_time_zone.as_deref()?)?;
        local
            .and_local_timezone(offset)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Offsets for the zone abbreviations AirNow reports.
fn zone_offset(zone: &str) -> Option<FixedOffset> {
    let hours = match zone.trim().to_ascii_uppercase().as_str() {
        "UTC" | "GMT" => 0,
        "ADT" => -3,
        "AST" => -4,
        "EST" => -5,
        "EDT" => -4,
        "CST" => -6,
        "CDT" => -5,
        "MST" => -7,
        "MDT" => -6,
        "PST" => -8,
        "PDT" => -7,
        "AKST" => -9,
        "AKDT" => -8,
        "HST" => -10,
        "SST" => -11,
        "CHST" => 10,
        _ => return None,
    };
    FixedOffset::east_opt(hours * 3600)
}

/// Parse a current-observations body: one entry per monitored parameter.
///
/// The overall AQI is the highest parameter AQI. AirNow reports indices only,
/// so pollutant concentrations stay unavailable.
pub fn parse_observations(body: &str) -> Result<Reading> {
    let observations: Vec<AnObservation> =
        serde_json::from_str(body).context("Failed to parse AirNow observations JSON")?;

    if observations.is_empty() {
        return Err(anyhow!("AirNow returned no observations for this location"));
    }

    let timestamp = observations
        .iter()
        .find_map(AnObservation::observed_at)
        .unwrap_or_else(Utc::now);

    let aqi = observations
        .iter()
        .map(|o| {
            tracing::trace!(parameter = %o.parameter_name, aqi = o.aqi, "airnow observation");
            o.canonical_aqi()
        })
        .max()
        .unwrap_or(UNAVAILABLE);

    Ok(Reading {
        aqi,
        category: category_for_aqi(aqi),
        pollutants: Pollutants::unavailable(),
        timestamp,
        source: SourceId::AirNow,
    })
}

#[async_trait]
impl AirQualityProvider for AirNowProvider {
    fn id(&self) -> SourceId {
        SourceId::AirNow
    }

    async fn fetch_reading(&self, lat: f64, lon: f64) -> Result<Reading> {
        let url = format!("{}/aq/observation/latLong/current/", self.base_url);

        let request = self.http.get(url).query(&[
            ("format", "application/json".to_string()),
            ("latitude", lat.to_string()),
            ("longitude", lon.to_string()),
            ("distance", SEARCH_DISTANCE_MILES.to_string()),
            ("API_KEY", self.api_key.clone()),
        ]);

        let body = send_and_read(request, "AirNow").await?;
        parse_observations(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AqiCategory;
    use chrono::TimeZone;

    #[test]
    fn overall_aqi_is_highest_parameter() {
        let body = r#"[
            {"DateObserved":"2024-05-01 ","HourObserved":13,"LocalTimeZone":"PST",
             "ReportingArea":"Oakland","ParameterName":"O3","AQI":32,
             "Category":{"Number":1,"Name":"Good"}},
            {"DateObserved":"2024-05-01 ","HourObserved":13,"LocalTimeZone":"PST",
             "ReportingArea":"Oakland","ParameterName":"PM2.5","AQI":58,
             "Category":{"Number":2,"Name":"Moderate"}}
        ]"#;

        let reading = parse_observations(body).unwrap();
        assert_eq!(reading.aqi, 58);
        assert_eq!(reading.category, AqiCategory::Moderate);
        assert_eq!(reading.source, SourceId::AirNow);
        assert_eq!(reading.pollutants, Pollutants::unavailable());
        assert_eq!(reading.timestamp, Utc.with_ymd_and_hms(2024, 5, 1, 21, 0, 0).unwrap());
    }

    #[test]
    fn observation_time_respects_daylight_zone() {
        let body = r#"[{"DateObserved":"2024-07-04 ","HourObserved":9,"LocalTimeZone":"EDT",
                        "ParameterName":"O3","AQI":41}]"#;
        let reading = parse_observations(body).unwrap();
        assert_eq!(reading.timestamp, Utc.with_ymd_and_hms(2024, 7, 4, 13, 0, 0).unwrap());
    }

    #[test]
    fn missing_observation_time_falls_back_to_now() {
        let before = Utc::now();
        let reading = parse_observations(r#"[{"ParameterName":"O3","AQI":20}]"#).unwrap();
        assert!(reading.timestamp >= before);

        let body = r#"[{"DateObserved":"2024-05-01","HourObserved":13,"LocalTimeZone":"XYZ",
                        "ParameterName":"O3","AQI":20}]"#;
        let reading = parse_observations(body).unwrap();
        assert!(reading.timestamp >= before);
    }

    #[test]
    fn negative_aqi_falls_back_to_category_name() {
        let body = r#"[{"ParameterName":"PM2.5","AQI":-1,
                        "Category":{"Number":3,"Name":"Unhealthy for Sensitive Groups"}}]"#;
        let reading = parse_observations(body).unwrap();
        assert_eq!(reading.aqi, 125);
        assert_eq!(reading.category, AqiCategory::UnhealthySensitive);
    }

    #[test]
    fn no_usable_value_yields_sentinel() {
        let body = r#"[{"ParameterName":"O3","AQI":-1}]"#;
        let reading = parse_observations(body).unwrap();
        assert_eq!(reading.aqi, -1);
        assert_eq!(reading.category, AqiCategory::Unknown);
    }

    #[test]
    fn empty_array_is_an_error() {
        let err = parse_observations("[]").unwrap_err();
        assert!(err.to_string().contains("no observations"));
    }
}
