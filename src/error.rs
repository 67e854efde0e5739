//! Error types for the pipeline stages and their external collaborators.

use thiserror::Error;

/// Errors that abort a pipeline stage.
///
/// Per-record geocoding failures are deliberately absent: they are captured
/// as data in [`crate::models::GeocodeOutcome`] and never reach this type.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to fetch archive: {0}")]
    Fetch(String),

    #[error("Failed to read archive: {0}")]
    Archive(String),

    #[error("Failed to parse {stage} input at {location}: {source}")]
    Parse {
        stage: &'static str,
        location: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Write failed: {0}")]
    Write(#[from] WriteError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Worker task failed: {0}")]
    Task(String),
}

impl PipelineError {
    /// Build a parse error for a numbered line of an intermediate store.
    pub fn parse_line(stage: &'static str, line: usize, source: serde_json::Error) -> Self {
        PipelineError::Parse {
            stage,
            location: format!("line {}", line),
            source,
        }
    }

    /// Build a parse error for a named archive entry.
    pub fn parse_entry(stage: &'static str, entry: &str, source: serde_json::Error) -> Self {
        PipelineError::Parse {
            stage,
            location: format!("entry '{}'", entry),
            source,
        }
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(e: reqwest::Error) -> Self {
        PipelineError::Fetch(e.to_string())
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(e: tokio::task::JoinError) -> Self {
        PipelineError::Task(e.to_string())
    }
}

/// Failure reported by a geocoder for a single address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeocodeError {
    #[error("No match found for address: {0}")]
    NotFound(String),

    #[error("Geocoder request failed: {0}")]
    Request(String),

    #[error("Geocoder returned HTTP {0}")]
    Status(u16),

    #[error("Invalid geocoder response: {0}")]
    Decode(String),
}

/// Failure reported by the emission writer for a single item.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize item: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Item rejected: {0}")]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
