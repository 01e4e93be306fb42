//! Error types for the detection-audit library.
//!
//! Per-detection failures (missing ground truth, low IoU, verifier outages)
//! are not errors: they are recorded on the detection itself. The variants
//! here cover the batch-level conditions that stop a run before it starts.

use thiserror::Error;

/// Result type for detection-audit operations.
pub type Result<T> = std::result::Result<T, AuditError>;

/// Error types that can occur while running the audit funnel.
#[derive(Error, Debug)]
pub enum AuditError {
    /// Error during JSON parsing or serialization.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error during I/O operations.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error parsing a YAML class-name table.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Invalid or unreadable configuration.
    #[error("Config error: {0}")]
    ConfigError(String),

    /// Invalid confidence or IoU threshold.
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),

    /// The ground-truth store as a whole cannot be used.
    #[error("Ground truth unavailable: {0}")]
    GroundTruthUnavailable(String),

    /// A credential required by the verifier is not configured.
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// The verifier refused to start a batch.
    #[error("Verifier unavailable: {0}")]
    VerifierUnavailable(String),

    /// Writing an artifact to disk failed after the data was serialized.
    #[error("Failed to persist {path}: {reason}")]
    PersistError { path: String, reason: String },
}

/// Failures reported by an external verifier for a single request.
///
/// These never abort a batch; the orchestrator maps every variant to the
/// `ERROR` verification outcome.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerifierError {
    /// The call did not finish within the request timeout.
    #[error("verifier timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The service could not be reached or answered with a failure.
    #[error("verifier unavailable: {0}")]
    Unavailable(String),

    /// The service rejected the call because a quota was exhausted.
    #[error("verifier quota exhausted: {0}")]
    Quota(String),

    /// The response could not be interpreted as text.
    #[error("malformed verifier response: {0}")]
    Malformed(String),
}
