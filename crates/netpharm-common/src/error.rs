//! Error types for netpharm
//!
//! Every pipeline component reports failures through [`NetpharmError`]. The
//! variants separate conditions a caller may recover from (a retried service
//! hiccup, a missing manual artifact) from data problems that need a human.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for netpharm operations
pub type Result<T> = std::result::Result<T, NetpharmError>;

/// Main error type for netpharm
#[derive(Error, Debug)]
pub enum NetpharmError {
    /// A lookup that must resolve to exactly one record found nothing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Input table is structurally unusable (e.g. no recognized score column)
    #[error("Data format error in {source_name}: {message}")]
    DataFormat { source_name: String, message: String },

    /// Manual handoff file is absent or lacks required columns
    #[error("Missing artifact '{}': {message}", path.display())]
    MissingArtifact { path: PathBuf, message: String },

    /// Docking input has no row for the reference gene
    #[error("Reference gene '{0}' not present in docking records")]
    MissingReference(String),

    /// Docking input lists the same gene more than once
    #[error("Duplicate docking record for gene '{0}'")]
    DuplicateRecord(String),

    /// Service call failed in a way that may succeed on retry
    #[error("Transient failure from {service}: {message}")]
    TransientService { service: String, message: String },

    /// Service call failed in a way retrying will not fix
    #[error("Service error from {service}: {message}")]
    NonTransientService { service: String, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Checksum mismatch for '{}': expected {expected}, got {actual}", path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl NetpharmError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn data_format(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataFormat {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn missing_artifact(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::MissingArtifact {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn transient(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransientService {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NonTransientService {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the failure is worth retrying with backoff
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientService { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_service_errors_are_retryable() {
        assert!(NetpharmError::transient("STRING", "503").is_transient());
        assert!(!NetpharmError::service("STRING", "400").is_transient());
        assert!(!NetpharmError::not_found("R-HSA-1").is_transient());
        assert!(!NetpharmError::MissingReference("DYRK2".into()).is_transient());
    }

    #[test]
    fn test_missing_artifact_message_names_file() {
        let err = NetpharmError::missing_artifact(
            "data/david_kegg.csv",
            "expected columns: Term, Count, %, Benjamini",
        );
        let msg = err.to_string();
        assert!(msg.contains("david_kegg.csv"));
        assert!(msg.contains("Benjamini"));
    }
}
