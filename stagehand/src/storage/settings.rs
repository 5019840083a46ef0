//! Settings loading: defaults, JSON settings file, environment and CLI overrides

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::logs::parse_level;

/// Environment variable consulted for the settings file path
pub const CONFIG_ENV_VAR: &str = "STAGEHAND_CONFIG";

/// Environment variables and the settings keys they populate
pub const ENV_VARS: &[(&str, &str)] = &[
    ("PLATFORM_API_URL", "platform_api_url"),
    ("PLATFORM_API_TOKEN", "platform_api_token"),
    ("APP_ID", "app_id"),
    ("SOURCE_BLOB_URL", "source_blob_url"),
    ("ARTIFACT_PATH", "artifact_path"),
    ("SOURCE_VERSION", "source_version"),
    ("PR_URL", "pr_url"),
    ("COMMIT_SHA", "commit_sha"),
    ("GITHUB_TOKEN", "github_token"),
    ("GITHUB_API_URL", "github_api_url"),
    ("STATUS_CONTEXT", "status_context"),
    ("TARGET_URL", "target_url"),
    ("RUN_ID", "run_id"),
    ("MAX_CONSECUTIVE_FAILURES", "max_consecutive_failures"),
    ("POLL_INTERVAL_SECS", "poll_interval_secs"),
    ("DEPLOY_TIMEOUT_SECS", "deploy_timeout_secs"),
    ("TELEMETRY_URL", "telemetry_url"),
    ("TELEMETRY_TOKEN", "telemetry_token"),
    ("LOG_LEVEL", "log_level"),
    ("LOG_JSON", "log_json"),
    ("LOG_DIR", "log_dir"),
];

/// CLI keys that are flags of the binary rather than settings
const META_KEYS: &[&str] = &["config", "version"];

/// Deploy settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the platform API
    pub platform_api_url: String,

    /// Platform API token
    pub platform_api_token: Option<String>,

    /// Target application on the platform
    pub app_id: Option<String>,

    /// Download URL of an already uploaded artifact
    pub source_blob_url: Option<String>,

    /// Local artifact to upload through a fresh build source
    pub artifact_path: Option<String>,

    /// Version label attached to the build, usually the commit SHA
    pub source_version: Option<String>,

    /// Pull request the deploy was triggered from
    pub pr_url: Option<String>,

    /// Commit to attach statuses to, skips the pull request lookup
    pub commit_sha: Option<String>,

    /// Token for the commit status API
    pub github_token: Option<String>,

    pub github_api_url: String,

    /// Status check name shown on the pull request
    pub status_context: String,

    /// Link attached to the status check
    pub target_url: Option<String>,

    /// Correlation ID for logs and telemetry
    pub run_id: Option<String>,

    pub max_consecutive_failures: u32,

    pub poll_interval_secs: u64,

    /// Wall-clock ceiling for the whole polling phase
    pub deploy_timeout_secs: u64,

    pub telemetry_url: Option<String>,

    pub telemetry_token: Option<String>,

    /// Default log level, `RUST_LOG` overrides it
    pub log_level: String,

    pub log_json: bool,

    pub log_dir: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            platform_api_url: "https://api.heroku.com".to_string(),
            platform_api_token: None,
            app_id: None,
            source_blob_url: None,
            artifact_path: None,
            source_version: None,
            pr_url: None,
            commit_sha: None,
            github_token: None,
            github_api_url: "https://api.github.com".to_string(),
            status_context: "staging-deploy".to_string(),
            target_url: None,
            run_id: None,
            max_consecutive_failures: 15,
            poll_interval_secs: 10,
            deploy_timeout_secs: 300,
            telemetry_url: None,
            telemetry_token: None,
            log_level: "info".to_string(),
            log_json: false,
            log_dir: None,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(secret: &Option<String>) -> &'static str {
            if secret.is_some() {
                "[REDACTED]"
            } else {
                "None"
            }
        }

        f.debug_struct("Settings")
            .field("platform_api_url", &self.platform_api_url)
            .field("platform_api_token", &redact(&self.platform_api_token))
            .field("app_id", &self.app_id)
            .field("source_blob_url", &self.source_blob_url)
            .field("artifact_path", &self.artifact_path)
            .field("source_version", &self.source_version)
            .field("pr_url", &self.pr_url)
            .field("commit_sha", &self.commit_sha)
            .field("github_token", &redact(&self.github_token))
            .field("github_api_url", &self.github_api_url)
            .field("status_context", &self.status_context)
            .field("target_url", &self.target_url)
            .field("run_id", &self.run_id)
            .field("max_consecutive_failures", &self.max_consecutive_failures)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("deploy_timeout_secs", &self.deploy_timeout_secs)
            .field("telemetry_url", &self.telemetry_url)
            .field("telemetry_token", &redact(&self.telemetry_token))
            .field("log_level", &self.log_level)
            .field("log_json", &self.log_json)
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

impl Settings {
    /// Load settings with the full precedence chain:
    /// defaults < settings file < environment < CLI arguments
    pub async fn load<E>(cli_args: &HashMap<String, String>, env: E) -> Result<Self, DeployError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let config_path = cli_args
            .get("config")
            .cloned()
            .or_else(|| non_empty(env(CONFIG_ENV_VAR)));

        let mut settings = match config_path {
            Some(path) => File::new(path).read_json::<Settings>().await?,
            None => Settings::default(),
        };

        settings.apply_env(env)?;
        settings.apply_args(cli_args)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Overlay environment variables. Empty values count as unset.
    pub fn apply_env<E>(&mut self, env: E) -> Result<(), DeployError>
    where
        E: Fn(&str) -> Option<String>,
    {
        for (var, key) in ENV_VARS {
            if let Some(value) = non_empty(env(var)) {
                self.set(key, &value)?;
            }
        }
        Ok(())
    }

    /// Overlay `--key=value` arguments
    pub fn apply_args(&mut self, cli_args: &HashMap<String, String>) -> Result<(), DeployError> {
        for (key, value) in cli_args {
            let key = key.replace('-', "_");
            if META_KEYS.contains(&key.as_str()) {
                continue;
            }
            self.set(&key, value)?;
        }
        Ok(())
    }

    /// Set a single setting from its string form
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), DeployError> {
        let value = value.trim();
        let opt = || Some(value.to_string());

        match key {
            "platform_api_url" => self.platform_api_url = value.to_string(),
            "platform_api_token" => self.platform_api_token = opt(),
            "app_id" => self.app_id = opt(),
            "source_blob_url" => self.source_blob_url = opt(),
            "artifact_path" => self.artifact_path = opt(),
            "source_version" => self.source_version = opt(),
            "pr_url" => self.pr_url = opt(),
            "commit_sha" => self.commit_sha = opt(),
            "github_token" => self.github_token = opt(),
            "github_api_url" => self.github_api_url = value.to_string(),
            "status_context" => self.status_context = value.to_string(),
            "target_url" => self.target_url = opt(),
            "run_id" => self.run_id = opt(),
            "max_consecutive_failures" => {
                self.max_consecutive_failures = parse_number(key, value)?
            }
            "poll_interval_secs" => self.poll_interval_secs = parse_number(key, value)?,
            "deploy_timeout_secs" => self.deploy_timeout_secs = parse_number(key, value)?,
            "telemetry_url" => self.telemetry_url = opt(),
            "telemetry_token" => self.telemetry_token = opt(),
            "log_level" => {
                self.log_level = parse_level(value)?.to_string();
            }
            "log_json" => self.log_json = parse_bool(key, value)?,
            "log_dir" => self.log_dir = opt(),
            _ => {
                return Err(DeployError::ConfigError(format!("Unknown setting: {}", key)));
            }
        }
        Ok(())
    }

    /// Check required settings and numeric bounds
    pub fn validate(&self) -> Result<(), DeployError> {
        if self.platform_api_token.is_none() {
            return Err(DeployError::ConfigError(
                "platform_api_token is required (PLATFORM_API_TOKEN)".to_string(),
            ));
        }
        if self.app_id.is_none() {
            return Err(DeployError::ConfigError("app_id is required (APP_ID)".to_string()));
        }
        match (&self.source_blob_url, &self.artifact_path) {
            (None, None) => {
                return Err(DeployError::ConfigError(
                    "one of source_blob_url or artifact_path is required".to_string(),
                ));
            }
            (Some(_), Some(_)) => {
                return Err(DeployError::ConfigError(
                    "source_blob_url and artifact_path are mutually exclusive".to_string(),
                ));
            }
            _ => {}
        }
        parse_level(&self.log_level)?;
        if self.max_consecutive_failures == 0 {
            return Err(DeployError::ConfigError(
                "max_consecutive_failures must be at least 1".to_string(),
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(DeployError::ConfigError(
                "poll_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.deploy_timeout_secs == 0 {
            return Err(DeployError::ConfigError(
                "deploy_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, DeployError> {
    value
        .parse()
        .map_err(|_| DeployError::ConfigError(format!("{} must be a number, got {:?}", key, value)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, DeployError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(DeployError::ConfigError(format!(
            "{} must be a boolean, got {:?}",
            key, value
        ))),
    }
}
