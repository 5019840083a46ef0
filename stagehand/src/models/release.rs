//! Release models

use serde::{Deserialize, Serialize};

/// Upload/download URL pair issued by the platform.
///
/// The upload URL receives the artifact once; the download URL is handed to
/// the release trigger once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSource {
    pub upload_url: String,
    pub download_url: String,
}

impl From<platform_models::SourceBlob> for BuildSource {
    fn from(blob: platform_models::SourceBlob) -> Self {
        Self {
            upload_url: blob.put_url,
            download_url: blob.get_url,
        }
    }
}

/// A single deploy attempt, fixed once the release is triggered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAttempt {
    pub source_blob_url: String,
    pub app_id: String,
    pub triggering_pr_url: Option<String>,
    pub run_id: String,
}

/// Result of one successful status query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseStatus {
    /// Still building, keep polling
    Building,

    Succeeded,

    /// The platform reports a failed build
    Failed(String),
}

impl From<platform_models::BuildResponse> for ReleaseStatus {
    fn from(build: platform_models::BuildResponse) -> Self {
        match build.status {
            platform_models::BuildStatus::Succeeded => ReleaseStatus::Succeeded,
            platform_models::BuildStatus::Failed => {
                let message = match build.output_stream_url {
                    Some(url) => format!("build {} failed, output: {}", build.id, url),
                    None => format!("build {} failed", build.id),
                };
                ReleaseStatus::Failed(message)
            }
            platform_models::BuildStatus::Pending | platform_models::BuildStatus::Unknown => {
                ReleaseStatus::Building
            }
        }
    }
}
