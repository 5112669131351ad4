use airq_core::{AirQualityEngine, Config, SourceId};
use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use inquire::{Confirm, Password};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "airq", version, about = "Multi-source air quality CLI")]
pub struct Cli {
    /// Log per-source outcomes and reconciliation details to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific source.
    Configure {
        /// Source short name, e.g. "airnow" or "purpleair".
        source: String,
    },

    /// List enabled sources and whether they have credentials.
    Sources,

    /// Show combined air quality for a coordinate.
    Show {
        /// Latitude in degrees, -90..=90.
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude in degrees, -180..=180.
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Print the full combined reading as JSON.
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { source } => configure(&source),
            Command::Sources => {
                let config = Config::load()?;
                print!("{}", render::sources_table(&config)?);
                Ok(())
            }
            Command::Show { lat, lon, json } => show(lat, lon, json).await,
        }
    }
}

fn configure(source: &str) -> anyhow::Result<()> {
    let id = SourceId::try_from(source)?;
    let mut config = Config::load()?;

    if config.is_provider_configured(id) {
        let replace = Confirm::new(&format!("An API key for '{id}' already exists. Replace it?"))
            .with_default(false)
            .prompt()
            .context("Failed to read confirmation")?;
        if !replace {
            println!("Keeping existing key for {id}.");
            return Ok(());
        }
    }

    let api_key = Password::new(&format!("API key for {id}:"))
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    if api_key.trim().is_empty() {
        bail!("API key for '{id}' must not be empty");
    }

    config.upsert_provider_api_key(id, api_key.trim().to_string());
    if !config.enabled_source_ids()?.contains(&id) {
        config.enabled_sources.push(id.as_str().to_string());
    }
    config.save()?;

    println!(
        "Saved credentials for {id} to {}",
        Config::config_file_path()?.display()
    );
    Ok(())
}

async fn show(lat: f64, lon: f64, json: bool) -> anyhow::Result<()> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        bail!("Coordinates out of range: lat must be within -90..=90 and lon within -180..=180");
    }

    let config = Config::load()?;
    let engine = AirQualityEngine::from_config(&config)?;
    let combined = engine.combine(lat, lon).await;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&combined).context("Failed to serialize result")?
        );
    } else {
        print!("{}", render::summary(&combined));
    }

    Ok(())
}
