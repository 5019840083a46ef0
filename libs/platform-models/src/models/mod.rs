//! API models

use serde::{Deserialize, Serialize};

// ================================ PLATFORM ====================================== //

/// Upload/download URL pair issued by the platform for a build artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceBlob {
    pub get_url: String,
    pub put_url: String,
}

/// Response to a build source creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSourceResponse {
    pub source_blob: SourceBlob,
}

/// Source blob reference sent when triggering a build
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSourceBlob {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Build creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBuildRequest {
    pub source_blob: BuildSourceBlob,
}

/// Build status as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Pending,
    Succeeded,
    Failed,
    #[serde(other)]
    Unknown,
}

/// Build resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildResponse {
    pub id: String,
    pub status: BuildStatus,
    #[serde(default)]
    pub output_stream_url: Option<String>,
}

/// Error body returned by the platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformErrorResponse {
    #[serde(default)]
    pub id: Option<String>,
    pub message: String,
}

// ============================== COMMIT STATUS =================================== //

/// Commit status state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitState {
    Pending,
    Success,
    Failure,
    Error,
}

/// Commit status creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitStatusRequest {
    pub state: CommitState,
    pub context: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
}

/// Head reference of a pull request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestHead {
    pub sha: String,
}

/// Pull request, reduced to what status reporting needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub head: PullRequestHead,
}

// ================================ TELEMETRY ===================================== //

/// Host the deploy ran on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostInfo {
    pub hostname: String,
    pub os: String,
    pub cpu_count: usize,
    pub memory_total: u64,
}

/// Completion event sent to the telemetry endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployEvent {
    pub event: String,
    pub run_id: String,
    pub app_id: String,
    pub release_id: Option<String>,
    pub status: String,
    pub polls: u32,
    pub elapsed_ms: u64,
    pub max_consecutive_failures: u32,
    pub pr_url: Option<String>,
    pub artifact_sha256: Option<String>,
    pub host: HostInfo,
    pub emitted_at: chrono::DateTime<chrono::Utc>,
}
