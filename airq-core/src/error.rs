use thiserror::Error;

use crate::model::SourceId;

/// Why a single source did not contribute a reading.
///
/// None of these are fatal to a combine: they only mark the source as failed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("No API key configured for source '{0}'")]
    ConfigurationMissing(SourceId),

    #[error("Source '{source_id}' unavailable: {error:#}")]
    ProviderUnavailable {
        source_id: SourceId,
        error: anyhow::Error,
    },

    #[error("Fetch task for source '{source_id}' did not complete: {message}")]
    TaskFailed { source_id: SourceId, message: String },
}

impl FetchError {
    pub fn source_id(&self) -> SourceId {
        match self {
            FetchError::ConfigurationMissing(id) => *id,
            FetchError::ProviderUnavailable { source_id, .. } => *source_id,
            FetchError::TaskFailed { source_id, .. } => *source_id,
        }
    }
}
