use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for the research assistant.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("configuration error: {0}")]
    InvalidConfiguration(String),
    #[error("missing environment variable: {0}")]
    MissingSecret(String),
    #[error("I/O error while reading {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Research(#[from] ResearchError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AssistantError {
    pub fn config_io(path: PathBuf, source: std::io::Error) -> Self {
        Self::ConfigIo { path, source }
    }
}

/// Failure of a single pipeline run.
///
/// The first stage failure aborts the run and is handed back to the caller
/// unchanged. Values are serialisable so a failing task can park them in the
/// workflow context.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ResearchError {
    #[error("search unavailable: {0}")]
    SearchUnavailable(String),
    #[error("analysis failed: {0}")]
    AnalysisFailed(String),
    #[error("report generation failed: {0}")]
    GenerationFailed(String),
    #[error("no findings available to build a report")]
    EmptyInput,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("orchestration failure: {0}")]
    Orchestration(String),
}

impl ResearchError {
    /// Stable short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ResearchError::SearchUnavailable(_) => "search_unavailable",
            ResearchError::AnalysisFailed(_) => "analysis_failed",
            ResearchError::GenerationFailed(_) => "generation_failed",
            ResearchError::EmptyInput => "empty_input",
            ResearchError::InvalidInput(_) => "invalid_input",
            ResearchError::Orchestration(_) => "orchestration",
        }
    }
}
