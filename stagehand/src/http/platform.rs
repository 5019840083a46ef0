//! Platform API client

use async_trait::async_trait;
use platform_models::{
    BuildResponse, BuildSourceBlob, CreateBuildRequest, CreateSourceResponse,
};
use secrecy::SecretString;
use tracing::{debug, info};

use crate::errors::DeployError;
use crate::http::client::{HttpClient, PLATFORM_ACCEPT};
use crate::models::release::{BuildSource, ReleaseStatus};

/// Platform operations used by a deploy attempt
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Request a fresh upload/download URL pair
    async fn create_source(&self, app_id: &str) -> Result<BuildSource, DeployError>;

    /// Upload the packaged artifact to the source's upload URL
    async fn upload_artifact(&self, source: &BuildSource, artifact: &[u8]) -> Result<(), DeployError>;

    /// Start a release from an uploaded artifact, returning the release ID
    async fn trigger_release(
        &self,
        source_blob_url: &str,
        app_id: &str,
        version: Option<&str>,
    ) -> Result<String, DeployError>;

    /// Query the current status of a release
    async fn release_status(&self, app_id: &str, release_id: &str) -> Result<ReleaseStatus, DeployError>;
}

/// Heroku-compatible platform client
pub struct PlatformClient {
    http: HttpClient,
}

impl PlatformClient {
    pub fn new(base_url: &str, token: SecretString) -> Result<Self, DeployError> {
        Ok(Self {
            http: HttpClient::with_token(base_url, PLATFORM_ACCEPT, token)?,
        })
    }
}

/// A rejected request at this stage means the artifact reference is unusable
fn artifact_error(err: DeployError) -> DeployError {
    match err {
        DeployError::RequestRejected { status, body } => {
            DeployError::InvalidArtifact(format!("{}: {}", status, body))
        }
        other => other,
    }
}

#[async_trait]
impl PlatformApi for PlatformClient {
    async fn create_source(&self, app_id: &str) -> Result<BuildSource, DeployError> {
        let path = format!("/apps/{}/sources", app_id);
        let response: CreateSourceResponse = self
            .http
            .post(&path, &serde_json::json!({}))
            .await
            .map_err(artifact_error)?;
        debug!("Created build source for {}", app_id);
        Ok(response.source_blob.into())
    }

    async fn upload_artifact(&self, source: &BuildSource, artifact: &[u8]) -> Result<(), DeployError> {
        self.http
            .put_bytes(&source.upload_url, artifact.to_vec())
            .await
            .map_err(artifact_error)?;
        info!("Uploaded artifact ({} bytes)", artifact.len());
        Ok(())
    }

    async fn trigger_release(
        &self,
        source_blob_url: &str,
        app_id: &str,
        version: Option<&str>,
    ) -> Result<String, DeployError> {
        let path = format!("/apps/{}/builds", app_id);
        let request = CreateBuildRequest {
            source_blob: BuildSourceBlob {
                url: source_blob_url.to_string(),
                version: version.map(str::to_string),
            },
        };
        let build: BuildResponse = self
            .http
            .post(&path, &request)
            .await
            .map_err(artifact_error)?;
        Ok(build.id)
    }

    async fn release_status(&self, app_id: &str, release_id: &str) -> Result<ReleaseStatus, DeployError> {
        let path = format!("/apps/{}/builds/{}", app_id, release_id);
        let build: BuildResponse = self.http.get(&path).await?;
        Ok(build.into())
    }
}
