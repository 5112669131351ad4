//! Core library for the `airq` CLI.
//!
//! This crate defines:
//! - Adapters for six air quality providers behind one trait
//! - Normalization of vendor scales onto the 0..=500 AQI
//! - Concurrent fan-out over every enabled source
//! - Reconciliation of disagreeing readings into one estimate with a confidence label
//! - Configuration & credentials handling
//!
//! It is used by `airq-cli`, but the [`AirQualityEngine`] can be embedded in any
//! async service.

pub mod builder;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod model;
pub mod normalize;
pub mod provider;
pub mod reconcile;

pub use config::{Config, ProviderConfig};
pub use engine::AirQualityEngine;
pub use error::FetchError;
pub use fetch::{FanOutFetcher, SourceOutcome};
pub use model::{
    AqiCategory, CombinedReading, Confidence, Discrepancy, Pollutants, Reading, SourceId, Strategy,
};
pub use provider::AirQualityProvider;
pub use reconcile::{ReconcileConfig, Reconciliation, TierThresholds, reconcile};
