//! Domain-specific errors for the staging pipeline

use thiserror::Error;

use crate::io::download::DownloadError;
use crate::io::extract::ExtractError;

/// Every fatal condition the pipeline can hit.
///
/// None of these are retried. Each variant carries the underlying diagnostic
/// so the operator sees why the run stopped.
#[derive(Error, Debug)]
pub enum StageError {
    /// Local tooling needed by a pending stage is missing or too old.
    #[error("Prerequisite not met: {0}")]
    PrerequisiteUnmet(String),

    /// The runtime archive could not be downloaded.
    #[error("Network failure: {0}")]
    Network(#[source] reqwest::Error),

    /// The external package mechanism reported failure.
    #[error("Package resolution failed: {diagnostic}")]
    Resolution {
        /// Captured output of the failing invocation.
        diagnostic: String,
    },

    /// The runtime archive could not be unpacked into a complete root.
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    /// The downloaded archive does not match the configured digest.
    #[error("Runtime archive hash mismatch: expected {expected}, got {actual}")]
    Integrity {
        /// Configured SHA-256.
        expected: String,
        /// SHA-256 of the bytes received.
        actual: String,
    },

    /// The manifest could not be serialized.
    #[error("Failed to serialize manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    /// Any other filesystem failure.
    #[error("{context}: {source}")]
    Io {
        /// What the pipeline was doing.
        context: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl StageError {
    /// Wrap an IO error with a description of the operation that failed.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Build a resolution failure from captured process output.
    pub fn resolution(diagnostic: impl Into<String>) -> Self {
        Self::Resolution {
            diagnostic: diagnostic.into(),
        }
    }
}

impl From<DownloadError> for StageError {
    fn from(err: DownloadError) -> Self {
        match err {
            DownloadError::Http(source) => Self::Network(source),
            DownloadError::Io(source) => Self::io("Failed to write runtime archive", source),
            DownloadError::HashMismatch { expected, actual } => Self::Integrity { expected, actual },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_context_in_message() {
        let err = StageError::io(
            "Failed to read wheels/",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "Failed to read wheels/: denied");
    }

    #[test]
    fn test_hash_mismatch_maps_to_integrity() {
        let err: StageError = DownloadError::HashMismatch {
            expected: "aa".to_string(),
            actual: "bb".to_string(),
        }
        .into();
        assert!(matches!(err, StageError::Integrity { .. }));
    }
}
