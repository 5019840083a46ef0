//! Application configuration options

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::deploy::retry;
use crate::errors::DeployError;
use crate::storage::settings::Settings;
use crate::utils::generate_uuid;
use crate::workers::poller;

/// Main application options
#[derive(Debug)]
pub struct AppOptions {
    /// Correlation ID for logs and telemetry
    pub run_id: String,

    /// Platform API configuration
    pub platform: PlatformOptions,

    /// Where the release artifact comes from
    pub source: SourceOptions,

    /// Version label attached to the release
    pub source_version: Option<String>,

    /// Poller options
    pub poller: poller::Options,

    /// Status reporting options
    pub reporter: ReporterOptions,

    /// Telemetry endpoint, if any
    pub telemetry: Option<TelemetryOptions>,
}

/// Platform API options
#[derive(Debug)]
pub struct PlatformOptions {
    pub api_url: String,
    pub token: SecretString,
    pub app_id: String,
}

/// Release artifact source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOptions {
    /// Artifact already uploaded, download URL known
    BlobUrl(String),

    /// Local artifact to upload through a new build source
    Artifact(PathBuf),
}

/// Commit status reporting options
#[derive(Debug)]
pub struct ReporterOptions {
    pub pr_url: Option<String>,
    pub commit_sha: Option<String>,
    pub token: Option<SecretString>,
    pub api_url: String,
    pub context: String,
    pub target_url: Option<String>,
}

/// Telemetry endpoint options
#[derive(Debug)]
pub struct TelemetryOptions {
    pub url: String,
    pub token: Option<SecretString>,
}

impl AppOptions {
    /// Build options from validated settings
    pub fn from_settings(settings: &Settings) -> Result<Self, DeployError> {
        settings.validate()?;

        let required = |value: &Option<String>, name: &str| {
            value
                .clone()
                .ok_or_else(|| DeployError::ConfigError(format!("{} is required", name)))
        };

        let source = match (&settings.source_blob_url, &settings.artifact_path) {
            (Some(url), None) => SourceOptions::BlobUrl(url.clone()),
            (None, Some(path)) => SourceOptions::Artifact(PathBuf::from(path)),
            _ => {
                return Err(DeployError::ConfigError(
                    "exactly one of source_blob_url or artifact_path is required".to_string(),
                ));
            }
        };

        Ok(Self {
            run_id: settings.run_id.clone().unwrap_or_else(generate_uuid),
            platform: PlatformOptions {
                api_url: settings.platform_api_url.clone(),
                token: SecretString::from(required(&settings.platform_api_token, "platform_api_token")?),
                app_id: required(&settings.app_id, "app_id")?,
            },
            source,
            source_version: settings.source_version.clone(),
            poller: poller::Options {
                interval: Duration::from_secs(settings.poll_interval_secs),
                max_consecutive_failures: settings.max_consecutive_failures,
                timeout: Duration::from_secs(settings.deploy_timeout_secs),
            },
            reporter: ReporterOptions {
                pr_url: settings.pr_url.clone(),
                commit_sha: settings.commit_sha.clone(),
                token: settings.github_token.clone().map(SecretString::from),
                api_url: settings.github_api_url.clone(),
                context: settings.status_context.clone(),
                target_url: settings.target_url.clone(),
            },
            telemetry: settings.telemetry_url.as_ref().map(|url| TelemetryOptions {
                url: url.clone(),
                token: settings.telemetry_token.clone().map(SecretString::from),
            }),
        })
    }

    /// Retry policy for the steps before polling starts, sharing the
    /// poller's interval and failure ceiling
    pub fn retry(&self) -> retry::Options {
        retry::Options {
            interval: self.poller.interval,
            max_attempts: self.poller.max_consecutive_failures,
        }
    }
}
