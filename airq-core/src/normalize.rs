//! Conversion of vendor-native scales into the canonical 0..=500 AQI.
//!
//! Vendors report air quality in several shapes:
//! - a ready-made US AQI (AirNow, IQAir, WAQI, Google),
//! - a coarse 1..=5 tier (OpenWeather),
//! - textual categories,
//! - raw particulate concentrations (PurpleAir).
//!
//! Everything funnels into [`clamp_aqi`] and [`category_for_aqi`] so every
//! adapter ends up with the same breakpoint table.

use crate::model::{AqiCategory, Pollutant, UNAVAILABLE, UNAVAILABLE_F64};

pub const MAX_AQI: i32 = 500;

/// Upper bound of each category, in ascending order.
const CATEGORY_BOUNDS: &[(i32, AqiCategory)] = &[
    (50, AqiCategory::Good),
    (100, AqiCategory::Moderate),
    (150, AqiCategory::UnhealthySensitive),
    (200, AqiCategory::Unhealthy),
    (300, AqiCategory::VeryUnhealthy),
    (MAX_AQI, AqiCategory::Hazardous),
];

/// (conc_lo, conc_hi, aqi_lo, aqi_hi)
type Breakpoint = (f64, f64, f64, f64);

const PM25_BREAKPOINTS: &[Breakpoint] = &[
    (0.0, 9.0, 0.0, 50.0),
    (9.1, 35.4, 51.0, 100.0),
    (35.5, 55.4, 101.0, 150.0),
    (55.5, 125.4, 151.0, 200.0),
    (125.5, 225.4, 201.0, 300.0),
    (225.5, 325.4, 301.0, 500.0),
];

const PM10_BREAKPOINTS: &[Breakpoint] = &[
    (0.0, 54.0, 0.0, 50.0),
    (55.0, 154.0, 51.0, 100.0),
    (155.0, 254.0, 101.0, 150.0),
    (255.0, 354.0, 151.0, 200.0),
    (355.0, 424.0, 201.0, 300.0),
    (425.0, 604.0, 301.0, 500.0),
];

/// Map a canonical AQI onto its category. Any negative value is `Unknown`.
pub fn category_for_aqi(aqi: i32) -> AqiCategory {
    if aqi < 0 {
        return AqiCategory::Unknown;
    }

    CATEGORY_BOUNDS
        .iter()
        .find(|(upper, _)| aqi <= *upper)
        .map(|(_, category)| *category)
        .unwrap_or(AqiCategory::Hazardous)
}

/// Round half away from zero and clamp into 0..=500; negatives and NaN become `-1`.
pub fn clamp_aqi(value: f64) -> i32 {
    if !value.is_finite() || value < 0.0 {
        return UNAVAILABLE;
    }
    (value.round() as i32).min(MAX_AQI)
}

/// A representative AQI for vendors that only report a category.
pub fn representative_aqi(category: AqiCategory) -> i32 {
    match category {
        AqiCategory::Good => 25,
        AqiCategory::Moderate => 75,
        AqiCategory::UnhealthySensitive => 125,
        AqiCategory::Unhealthy => 175,
        AqiCategory::VeryUnhealthy => 250,
        AqiCategory::Hazardous => 400,
        AqiCategory::Unknown => UNAVAILABLE,
    }
}

/// Map a 1..=5 tier (1 best) onto the canonical scale.
pub fn aqi_from_tier(tier: u8) -> i32 {
    let category = match tier {
        1 => AqiCategory::Good,
        2 => AqiCategory::Moderate,
        3 => AqiCategory::UnhealthySensitive,
        4 => AqiCategory::Unhealthy,
        5 => AqiCategory::VeryUnhealthy,
        _ => AqiCategory::Unknown,
    };
    representative_aqi(category)
}

/// Parse a free-text category such as "Unhealthy for Sensitive Groups".
pub fn category_from_label(label: &str) -> AqiCategory {
    let lower = label.trim().to_lowercase();

    // Order matters: "very unhealthy" and "sensitive" both contain "unhealthy".
    if lower.contains("hazardous") {
        AqiCategory::Hazardous
    } else if lower.contains("very unhealthy") {
        AqiCategory::VeryUnhealthy
    } else if lower.contains("sensitive") || lower == "usg" {
        AqiCategory::UnhealthySensitive
    } else if lower.contains("unhealthy") {
        AqiCategory::Unhealthy
    } else if lower.contains("moderate") {
        AqiCategory::Moderate
    } else if lower.contains("good") {
        AqiCategory::Good
    } else {
        AqiCategory::Unknown
    }
}

/// EPA PM2.5 sub-index from a 24h-style concentration in µg/m³.
pub fn aqi_from_pm25(concentration: f64) -> i32 {
    // EPA truncates PM2.5 to one decimal place before lookup.
    let truncated = (concentration * 10.0).trunc() / 10.0;
    interpolate(truncated, PM25_BREAKPOINTS)
}

/// EPA PM10 sub-index from a concentration in µg/m³.
pub fn aqi_from_pm10(concentration: f64) -> i32 {
    interpolate(concentration.trunc(), PM10_BREAKPOINTS)
}

fn interpolate(concentration: f64, table: &[Breakpoint]) -> i32 {
    if !concentration.is_finite() || concentration < 0.0 {
        return UNAVAILABLE;
    }

    let Some(&(c_lo, c_hi, i_lo, i_hi)) = table
        .iter()
        .find(|(_, c_hi, _, _)| concentration <= *c_hi)
    else {
        return MAX_AQI;
    };

    let c = concentration.max(c_lo);
    clamp_aqi((i_hi - i_lo) / (c_hi - c_lo) * (c - c_lo) + i_lo)
}

/// Molar volume of an ideal gas at 25 °C and 1 atm, in litres.
const MOLAR_VOLUME_L: f64 = 24.45;

/// Convert a gas mixing ratio in ppb to µg/m³. Particulates pass through unchanged.
pub fn ppb_to_ugm3(pollutant: Pollutant, ppb: f64) -> f64 {
    let molar_mass = match pollutant {
        Pollutant::O3 => 48.00,
        Pollutant::No2 => 46.01,
        Pollutant::So2 => 64.07,
        Pollutant::Co => 28.01,
        Pollutant::Pm25 | Pollutant::Pm10 => return ppb,
    };
    ppb * molar_mass / MOLAR_VOLUME_L
}

/// Absent or negative vendor values become the `-1` sentinel.
pub fn pollutant_or_unavailable(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() && v >= 0.0 => v,
        _ => UNAVAILABLE_F64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_breakpoints_are_inclusive_upper_bounds() {
        assert_eq!(category_for_aqi(0), AqiCategory::Good);
        assert_eq!(category_for_aqi(50), AqiCategory::Good);
        assert_eq!(category_for_aqi(51), AqiCategory::Moderate);
        assert_eq!(category_for_aqi(100), AqiCategory::Moderate);
        assert_eq!(category_for_aqi(101), AqiCategory::UnhealthySensitive);
        assert_eq!(category_for_aqi(150), AqiCategory::UnhealthySensitive);
        assert_eq!(category_for_aqi(151), AqiCategory::Unhealthy);
        assert_eq!(category_for_aqi(200), AqiCategory::Unhealthy);
        assert_eq!(category_for_aqi(201), AqiCategory::VeryUnhealthy);
        assert_eq!(category_for_aqi(300), AqiCategory::VeryUnhealthy);
        assert_eq!(category_for_aqi(301), AqiCategory::Hazardous);
        assert_eq!(category_for_aqi(500), AqiCategory::Hazardous);
    }

    #[test]
    fn sentinel_maps_to_unknown() {
        assert_eq!(category_for_aqi(-1), AqiCategory::Unknown);
    }

    #[test]
    fn clamp_rounds_half_away_from_zero() {
        assert_eq!(clamp_aqi(50.5), 51);
        assert_eq!(clamp_aqi(50.49), 50);
        assert_eq!(clamp_aqi(612.0), 500);
        assert_eq!(clamp_aqi(-3.0), -1);
        assert_eq!(clamp_aqi(f64::NAN), -1);
    }

    #[test]
    fn tiers_map_into_matching_categories() {
        for tier in 1..=5u8 {
            let aqi = aqi_from_tier(tier);
            assert!(aqi >= 0);
        }
        assert_eq!(category_for_aqi(aqi_from_tier(1)), AqiCategory::Good);
        assert_eq!(category_for_aqi(aqi_from_tier(3)), AqiCategory::UnhealthySensitive);
        assert_eq!(category_for_aqi(aqi_from_tier(5)), AqiCategory::VeryUnhealthy);
        assert_eq!(aqi_from_tier(0), -1);
        assert_eq!(aqi_from_tier(6), -1);
    }

    #[test]
    fn labels_parse_to_categories() {
        assert_eq!(category_from_label("Good"), AqiCategory::Good);
        assert_eq!(
            category_from_label("Unhealthy for Sensitive Groups"),
            AqiCategory::UnhealthySensitive
        );
        assert_eq!(category_from_label("VERY UNHEALTHY"), AqiCategory::VeryUnhealthy);
        assert_eq!(category_from_label("Unhealthy"), AqiCategory::Unhealthy);
        assert_eq!(category_from_label("Moderate air quality"), AqiCategory::Moderate);
        assert_eq!(category_from_label("Unavailable"), AqiCategory::Unknown);
    }

    #[test]
    fn pm25_matches_epa_table() {
        assert_eq!(aqi_from_pm25(0.0), 0);
        assert_eq!(aqi_from_pm25(9.0), 50);
        assert_eq!(aqi_from_pm25(9.1), 51);
        assert_eq!(aqi_from_pm25(35.4), 100);
        assert_eq!(aqi_from_pm25(12.0), 56);
        assert_eq!(aqi_from_pm25(500.0), 500);
        assert_eq!(aqi_from_pm25(-1.0), -1);
    }

    #[test]
    fn pm10_matches_epa_table() {
        assert_eq!(aqi_from_pm10(54.0), 50);
        assert_eq!(aqi_from_pm10(55.0), 51);
        assert_eq!(aqi_from_pm10(154.9), 100);
    }

    #[test]
    fn ppb_converts_gases_only() {
        assert!((ppb_to_ugm3(Pollutant::No2, 24.45) - 46.01).abs() < 1e-9);
        assert!((ppb_to_ugm3(Pollutant::Co, 100.0) - 114.56).abs() < 0.01);
        assert_eq!(ppb_to_ugm3(Pollutant::Pm25, 7.5), 7.5);
    }

    #[test]
    fn missing_pollutants_become_sentinel() {
        assert_eq!(pollutant_or_unavailable(None), -1.0);
        assert_eq!(pollutant_or_unavailable(Some(-4.0)), -1.0);
        assert_eq!(pollutant_or_unavailable(Some(0.0)), 0.0);
        assert_eq!(pollutant_or_unavailable(Some(3.2)), 3.2);
    }
}
