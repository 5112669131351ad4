use airq_core::{CombinedReading, Config, Pollutants, SourceId};
use chrono::Local;
use std::fmt;

/// Human-readable summary of a combined reading.
pub fn summary(reading: &CombinedReading) -> String {
    Summary(reading).to_string()
}

struct Summary<'a>(&'a CombinedReading);

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reading = self.0;

        match &reading.error {
            Some(error) => writeln!(f, "{error}")?,
            None => writeln!(f, "AQI {} ({})", reading.aqi, reading.category)?,
        }

        writeln!(f, "Confidence: {}", reading.confidence)?;
        writeln!(
            f,
            "As of: {}",
            reading.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M %Z")
        )?;

        if let Some(d) = &reading.discrepancy {
            writeln!(f, "Warning: {}", d.details)?;
        }

        let pollutants = pollutant_lines(&reading.pollutants);
        if !pollutants.is_empty() {
            writeln!(f, "Pollutants (µg/m³):")?;
            for line in pollutants {
                writeln!(f, "  {line}")?;
            }
        }

        writeln!(f, "Sources:")?;
        for (id, ok) in &reading.sources {
            let detail = match reading.raw_readings.get(id) {
                Some(raw) if raw.aqi >= 0 => format!("AQI {}", raw.aqi),
                Some(_) => "no AQI reported".to_string(),
                None => "failed".to_string(),
            };
            let mark = if *ok { "ok" } else { "--" };
            writeln!(f, "  [{mark}] {:<12} {detail}", id.as_str())?;
        }

        Ok(())
    }
}

fn pollutant_lines(p: &Pollutants) -> Vec<String> {
    [
        ("PM2.5", p.pm25),
        ("PM10", p.pm10),
        ("O3", p.o3),
        ("NO2", p.no2),
        ("SO2", p.so2),
        ("CO", p.co),
    ]
    .into_iter()
    .filter(|(_, v)| *v >= 0.0)
    .map(|(name, v)| format!("{name:<6} {v}"))
    .collect()
}

/// Table of enabled sources and their credential status.
pub fn sources_table(config: &Config) -> anyhow::Result<String> {
    let enabled = config.enabled_source_ids()?;
    let weights = config.effective_weights()?;

    let table: String = SourceId::all()
        .iter()
        .map(|id| {
            let state = if !enabled.contains(id) {
                "disabled"
            } else if config.is_provider_configured(*id) {
                "configured"
            } else {
                "missing key"
            };
            let weight = weights.get(id).copied().unwrap_or_default();
            format!("{:<12} {:<12} weight {weight:.2}\n", id.as_str(), state)
        })
        .collect();

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use airq_core::{AqiCategory, Confidence, Discrepancy, Reading, Strategy};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn combined() -> CombinedReading {
        let raw = Reading {
            aqi: 64,
            category: AqiCategory::Moderate,
            pollutants: Pollutants::unavailable(),
            timestamp: Utc::now(),
            source: SourceId::AirNow,
        };

        let mut pollutants = Pollutants::unavailable();
        pollutants.pm25 = 18.0;

        CombinedReading {
            aqi: 64,
            category: AqiCategory::Moderate,
            pollutants,
            timestamp: Utc::now(),
            sources: BTreeMap::from([(SourceId::AirNow, true), (SourceId::Waqi, false)]),
            confidence: Confidence::Medium,
            discrepancy: None,
            raw_readings: BTreeMap::from([(SourceId::AirNow, raw)]),
            error: None,
        }
    }

    #[test]
    fn summary_lists_value_sources_and_pollutants() {
        let text = summary(&combined());
        assert!(text.contains("AQI 64 (Moderate)"));
        assert!(text.contains("Confidence: medium"));
        assert!(text.contains("PM2.5  18"));
        assert!(!text.contains("NO2"));
        assert!(text.contains("[ok] airnow"));
        assert!(text.contains("[--] waqi"));
    }

    #[test]
    fn summary_shows_error_and_discrepancy() {
        let mut reading = combined();
        reading.error = Some("No air quality data available from any source".into());
        reading.discrepancy = Some(Discrepancy {
            detected: true,
            max_difference: 70.0,
            strategy: Strategy::FavorMajority,
            details: "Sources disagree".into(),
        });

        let text = summary(&reading);
        assert!(text.starts_with("No air quality data available"));
        assert!(text.contains("Warning: Sources disagree"));
    }

    #[test]
    fn summary_sections_come_in_order() {
        let text = summary(&combined());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "AQI 64 (Moderate)");
        assert_eq!(lines[1], "Confidence: medium");
        assert!(lines[2].starts_with("As of: "));
        assert_eq!(lines[3], "Pollutants (µg/m³):");
        assert_eq!(lines[5], "Sources:");
        assert!(text.ends_with("failed\n"));
    }

    #[test]
    fn sources_table_reports_credential_state() {
        let mut config = Config {
            enabled_sources: vec!["airnow".into(), "waqi".into()],
            ..Config::default()
        };
        config.upsert_provider_api_key(SourceId::AirNow, "KEY".into());

        let table = sources_table(&config).unwrap();
        assert!(table.contains("airnow       configured   weight 0.30"));
        assert!(table.contains("waqi         missing key"));
        assert!(table.contains("google       disabled"));
        assert_eq!(table.lines().count(), SourceId::all().len());
    }
}
