use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// Sentinel for any value a source did not supply.
pub const UNAVAILABLE: i32 = -1;

/// Floating-point form of [`UNAVAILABLE`], used for pollutant fields.
pub const UNAVAILABLE_F64: f64 = -1.0;

/// One external air quality feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    /// US EPA AirNow, the official government feed.
    AirNow,
    IqAir,
    PurpleAir,
    Waqi,
    OpenWeather,
    Google,
}

impl SourceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::AirNow => "airnow",
            SourceId::IqAir => "iqair",
            SourceId::PurpleAir => "purpleair",
            SourceId::Waqi => "waqi",
            SourceId::OpenWeather => "openweather",
            SourceId::Google => "google",
        }
    }

    pub const fn all() -> &'static [SourceId] {
        &[
            SourceId::AirNow,
            SourceId::IqAir,
            SourceId::PurpleAir,
            SourceId::Waqi,
            SourceId::OpenWeather,
            SourceId::Google,
        ]
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for SourceId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        SourceId::all()
            .iter()
            .copied()
            .find(|id| id.as_str() == lower)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown source '{value}'. Supported sources: airnow, iqair, purpleair, waqi, openweather, google."
                )
            })
    }
}

/// Six-tier EPA category plus `Unknown` for an unavailable AQI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AqiCategory {
    Good,
    Moderate,
    UnhealthySensitive,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
    Unknown,
}

impl AqiCategory {
    pub fn label(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthySensitive => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
            AqiCategory::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pollutant {
    Pm25,
    Pm10,
    O3,
    No2,
    So2,
    Co,
}

impl Pollutant {
    pub const fn all() -> &'static [Pollutant] {
        &[
            Pollutant::Pm25,
            Pollutant::Pm10,
            Pollutant::O3,
            Pollutant::No2,
            Pollutant::So2,
            Pollutant::Co,
        ]
    }
}

/// Pollutant values; every field is either `-1.0` or non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pollutants {
    pub pm25: f64,
    pub pm10: f64,
    pub o3: f64,
    pub no2: f64,
    pub so2: f64,
    pub co: f64,
}

impl Pollutants {
    pub const fn unavailable() -> Self {
        Self {
            pm25: UNAVAILABLE_F64,
            pm10: UNAVAILABLE_F64,
            o3: UNAVAILABLE_F64,
            no2: UNAVAILABLE_F64,
            so2: UNAVAILABLE_F64,
            co: UNAVAILABLE_F64,
        }
    }

    pub fn get(&self, pollutant: Pollutant) -> f64 {
        match pollutant {
            Pollutant::Pm25 => self.pm25,
            Pollutant::Pm10 => self.pm10,
            Pollutant::O3 => self.o3,
            Pollutant::No2 => self.no2,
            Pollutant::So2 => self.so2,
            Pollutant::Co => self.co,
        }
    }

    pub fn set(&mut self, pollutant: Pollutant, value: f64) {
        let slot = match pollutant {
            Pollutant::Pm25 => &mut self.pm25,
            Pollutant::Pm10 => &mut self.pm10,
            Pollutant::O3 => &mut self.o3,
            Pollutant::No2 => &mut self.no2,
            Pollutant::So2 => &mut self.so2,
            Pollutant::Co => &mut self.co,
        };
        *slot = value;
    }
}

impl Default for Pollutants {
    fn default() -> Self {
        Self::unavailable()
    }
}

/// A single source's normalized reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Canonical 0..=500 AQI, or `-1`.
    pub aqi: i32,
    pub category: AqiCategory,
    pub pollutants: Pollutants,
    pub timestamp: DateTime<Utc>,
    pub source: SourceId,
}

impl Reading {
    pub fn has_aqi(&self) -> bool {
        self.aqi >= 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Average,
    WeightedAverage,
    Median,
    FavorMajority,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Average => "average",
            Strategy::WeightedAverage => "weighted_average",
            Strategy::Median => "median",
            Strategy::FavorMajority => "favor_majority",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
    Conflicting,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
            Confidence::Conflicting => "conflicting",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub detected: bool,
    pub max_difference: f64,
    pub strategy: Strategy,
    pub details: String,
}

/// The engine's answer for one coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedReading {
    pub aqi: i32,
    pub category: AqiCategory,
    pub pollutants: Pollutants,
    pub timestamp: DateTime<Utc>,
    /// Whether each enabled source's call succeeded, regardless of whether its data was used.
    pub sources: BTreeMap<SourceId, bool>,
    pub confidence: Confidence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discrepancy: Option<Discrepancy>,
    pub raw_readings: BTreeMap<SourceId, Reading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
