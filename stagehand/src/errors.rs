//! Error types for the stagehand deploy tool

use thiserror::Error;

/// Main error type for a deploy attempt
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Transport failure or 5xx from the platform. Retried.
    #[error("Platform unavailable: {0}")]
    PlatformUnavailable(String),

    /// The platform rejected the artifact reference. Never retried.
    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 4xx response other than 401/403
    #[error("Request rejected ({status}): {body}")]
    RequestRejected { status: u16, body: String },

    #[error("Build failed: {0}")]
    BuildFailed(String),

    #[error("Poll timeout: {0}")]
    PollTimeout(String),

    #[error("Reporting failure: {0}")]
    ReportingFailure(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("Deploy cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for DeployError {
    fn from(err: reqwest::Error) -> Self {
        DeployError::PlatformUnavailable(err.to_string())
    }
}

impl DeployError {
    /// Whether the error may clear up on a later attempt
    pub fn is_transient(&self) -> bool {
        matches!(self, DeployError::PlatformUnavailable(_))
    }
}
