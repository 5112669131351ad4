use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
};

use crate::{model::SourceId, reconcile::ReconcileConfig};

/// Credentials for a single source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// enabled_sources = ["airnow", "purpleair", "waqi"]
///
/// [providers.airnow]
/// api_key = "..."
///
/// [weights]
/// airnow = 0.4
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_enabled_sources")]
    pub enabled_sources: Vec<String>,

    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Overrides of the built-in reliability weights.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub weights: HashMap<String, f64>,

    /// Replaces the built-in authority order when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Vec<String>>,
}

fn default_enabled_sources() -> Vec<String> {
    SourceId::all().iter().map(|id| id.as_str().to_string()).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled_sources: default_enabled_sources(),
            providers: HashMap::new(),
            weights: HashMap::new(),
            priority: None,
        }
    }
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        // Surface typos in source ids at load time rather than on first use.
        cfg.enabled_source_ids()?;
        cfg.reconcile_config()?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "airq", "airq")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Set or replace a source's API key.
    pub fn upsert_provider_api_key(&mut self, source: SourceId, api_key: String) {
        self.providers.insert(source.as_str().to_string(), ProviderConfig { api_key });
    }

    /// Returns the API key for a source, if present and non-blank.
    pub fn provider_api_key(&self, source: SourceId) -> Option<&str> {
        self.providers
            .get(source.as_str())
            .map(|cfg| cfg.api_key.as_str())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn is_provider_configured(&self, source: SourceId) -> bool {
        self.provider_api_key(source).is_some()
    }

    /// Enabled sources in configured order, duplicates dropped.
    pub fn enabled_source_ids(&self) -> Result<Vec<SourceId>> {
        let mut ids = Vec::with_capacity(self.enabled_sources.len());
        for name in &self.enabled_sources {
            let id = parse_source(name)?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Build reconciler settings from the built-in defaults plus any overrides.
    pub fn reconcile_config(&self) -> Result<ReconcileConfig> {
        let mut config = ReconcileConfig::new(self.enabled_source_ids()?.len());

        for (name, weight) in &self.weights {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(anyhow!(
                    "Invalid weight {weight} for source '{name}': weights must be non-negative."
                ));
            }
            config.weights.insert(parse_source(name)?, *weight);
        }

        if let Some(priority) = &self.priority {
            let order = priority
                .iter()
                .map(|name| parse_source(name))
                .collect::<Result<Vec<_>>>()?;
            config = config.with_priority(order);
        }

        Ok(config)
    }

    /// Current effective weight table, for display.
    pub fn effective_weights(&self) -> Result<BTreeMap<SourceId, f64>> {
        Ok(self.reconcile_config()?.weights)
    }
}

fn parse_source(name: &str) -> Result<SourceId> {
    SourceId::try_from(name).with_context(|| {
        "Hint: check the source names in your config file (`airq sources` lists them)."
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_enables_every_source() {
        let cfg = Config::default();
        assert_eq!(cfg.enabled_source_ids().unwrap(), SourceId::all().to_vec());
        assert!(!cfg.is_provider_configured(SourceId::AirNow));
    }

    #[test]
    fn set_api_key_for_source() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(SourceId::AirNow, "AIRNOW_KEY".into());

        assert_eq!(cfg.provider_api_key(SourceId::AirNow), Some("AIRNOW_KEY"));
        assert!(cfg.is_provider_configured(SourceId::AirNow));
        assert!(!cfg.is_provider_configured(SourceId::Waqi));
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(SourceId::Waqi, "   ".into());
        assert!(!cfg.is_provider_configured(SourceId::Waqi));
    }

    #[test]
    fn parses_toml_with_overrides() {
        let cfg: Config = toml::from_str(
            r#"
            enabled_sources = ["AirNow", "waqi", "airnow"]
            priority = ["waqi", "airnow"]

            [providers.airnow]
            api_key = "A"

            [weights]
            waqi = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(cfg.enabled_source_ids().unwrap(), vec![SourceId::AirNow, SourceId::Waqi]);

        let rc = cfg.reconcile_config().unwrap();
        assert_eq!(rc.total_sources, 2);
        assert_eq!(rc.weights[&SourceId::Waqi], 0.5);
        assert_eq!(rc.weights[&SourceId::AirNow], 0.30);
        assert_eq!(rc.priority, vec![SourceId::Waqi, SourceId::AirNow]);
    }

    #[test]
    fn missing_enabled_sources_defaults_to_all() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.enabled_source_ids().unwrap().len(), 6);
    }

    #[test]
    fn unknown_source_is_rejected_with_hint() {
        let cfg = Config {
            enabled_sources: vec!["airnow".into(), "airnowww".into()],
            ..Config::default()
        };
        let err = cfg.enabled_source_ids().unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("Hint"));
        assert!(msg.contains("Unknown source 'airnowww'"));
    }

    #[test]
    fn negative_weight_is_rejected() {
        let mut cfg = Config::default();
        cfg.weights.insert("airnow".into(), -0.2);
        let err = cfg.reconcile_config().unwrap_err();
        assert!(err.to_string().contains("Invalid weight"));
    }

    #[test]
    fn save_and_load_round_trip_through_disk() {
        let dir = std::env::temp_dir().join(format!("airq-config-test-{}", std::process::id()));
        let path = dir.join("config.toml");

        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(SourceId::PurpleAir, "PA".into());
        cfg.weights.insert("purpleair".into(), 0.4);
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.provider_api_key(SourceId::PurpleAir), Some("PA"));
        assert_eq!(loaded.weights.get("purpleair"), Some(&0.4));

        fs::remove_dir_all(&dir).ok();
    }
}
