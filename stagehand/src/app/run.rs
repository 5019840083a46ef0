//! Deploy attempt orchestration

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use colored::Colorize;
use platform_models::DeployEvent;
use secrecy::{ExposeSecret, SecretString};
use tracing::{error, info, warn};

use crate::app::options::{AppOptions, SourceOptions};
use crate::deploy::fsm::PollStatus;
use crate::deploy::report::{report_status, StatusUpdate};
use crate::deploy::retry::retry_transient;
use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::http::github::{GithubReporter, StatusReporter};
use crate::http::platform::{PlatformApi, PlatformClient};
use crate::models::release::ReleaseAttempt;
use crate::telemetry::{emit_event, host_info, TelemetryClient, TelemetrySink, EVENT_NAME};
use crate::utils::sha256_hash;
use crate::workers::poller::{self, PollOutcome};

/// External collaborators of a deploy attempt
pub struct Deps<'a> {
    pub platform: &'a dyn PlatformApi,
    pub reporter: Option<&'a dyn StatusReporter>,
    pub telemetry: Option<&'a dyn TelemetrySink>,
}

/// Everything known about a finished deploy attempt
#[derive(Debug)]
pub struct DeployReport {
    pub run_id: String,
    pub release_id: Option<String>,
    pub artifact_sha256: Option<String>,

    /// Set once polling ran
    pub outcome: Option<PollOutcome>,

    /// `Ok` only when the release succeeded
    pub result: Result<(), DeployError>,
}

impl DeployReport {
    /// Process exit code for the invoking workflow
    pub fn exit_code(&self) -> i32 {
        match &self.result {
            Ok(()) => 0,
            Err(DeployError::BuildFailed(_)) => 1,
            Err(DeployError::PollTimeout(_)) => 2,
            Err(DeployError::Cancelled) => 130,
            Err(_) => 3,
        }
    }

    /// Status label used in telemetry
    pub fn status_label(&self) -> &'static str {
        match (&self.outcome, &self.result) {
            (Some(outcome), _) => outcome.status.as_str(),
            (None, Err(DeployError::Cancelled)) => PollStatus::Cancelled.as_str(),
            (None, _) => "error",
        }
    }

    /// One-line human readable summary
    pub fn summary(&self) -> String {
        let release = self.release_id.as_deref().unwrap_or("-");
        match &self.result {
            Ok(()) => format!("deploy succeeded: release {} is live", release),
            Err(DeployError::BuildFailed(msg)) => {
                format!("deploy failed: the platform reported a failed build ({})", msg)
            }
            Err(DeployError::PollTimeout(msg)) => {
                format!("deploy timed out: release {} did not finish ({})", release, msg)
            }
            Err(DeployError::Cancelled) => "deploy cancelled: superseded by a newer run".to_string(),
            Err(e) => format!("deploy could not start: {}", e),
        }
    }

    /// Summary colored by outcome, for terminal output
    pub fn colored_summary(&self) -> String {
        let summary = self.summary();
        match self.exit_code() {
            0 => summary.green().bold().to_string(),
            130 => summary.yellow().to_string(),
            _ => summary.red().bold().to_string(),
        }
    }
}

fn clone_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_string())
}

/// Run a deploy attempt against the real platform, GitHub and telemetry
/// endpoints
pub async fn run(
    options: &AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<DeployReport, DeployError> {
    let platform = PlatformClient::new(&options.platform.api_url, clone_secret(&options.platform.token))?;

    let reporter = match (&options.reporter.pr_url, &options.reporter.token) {
        (Some(_), Some(token)) => Some(GithubReporter::new(
            &options.reporter.api_url,
            clone_secret(token),
            options.reporter.context.clone(),
            options.reporter.target_url.clone(),
            options.reporter.commit_sha.clone(),
        )?),
        (Some(_), None) => {
            warn!("PR URL set without a GitHub token, status reporting disabled");
            None
        }
        _ => None,
    };

    let telemetry = match &options.telemetry {
        Some(telemetry) => Some(TelemetryClient::new(
            &telemetry.url,
            telemetry.token.as_ref().map(clone_secret),
        )?),
        None => None,
    };

    let deps = Deps {
        platform: &platform,
        reporter: reporter.as_ref().map(|r| r as &dyn StatusReporter),
        telemetry: telemetry.as_ref().map(|t| t as &dyn TelemetrySink),
    };

    Ok(deploy(options, &deps, tokio::time::sleep, shutdown_signal).await)
}

/// Drive one deploy attempt from artifact to terminal status.
///
/// Every path ends with status reporting and telemetry; the error, if any,
/// is carried in `DeployReport::result`.
pub async fn deploy<S, F>(
    options: &AppOptions,
    deps: &Deps<'_>,
    sleep_fn: S,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> DeployReport
where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    let mut shutdown: Pin<Box<dyn Future<Output = ()> + Send>> = Box::pin(shutdown_signal);
    let pr_url = options.reporter.pr_url.as_deref();
    let app_id = options.platform.app_id.as_str();

    let mut report = DeployReport {
        run_id: options.run_id.clone(),
        release_id: None,
        artifact_sha256: None,
        outcome: None,
        result: Ok(()),
    };

    info!("Starting deploy run {} for {}", options.run_id, app_id);

    let triggered = trigger(options, deps, &sleep_fn, &mut shutdown, &mut report).await;
    let release_id = match triggered {
        Ok(release_id) => release_id,
        Err(e) => {
            error!("Deploy could not start: {}", e);
            if !matches!(e, DeployError::Cancelled) {
                report_status(deps.reporter, pr_url, &StatusUpdate::setup_error(&e)).await;
            }
            report.result = Err(e);
            send_telemetry(options, deps, &report).await;
            return report;
        }
    };
    report.release_id = Some(release_id.clone());

    if let Some(update) = StatusUpdate::for_status(PollStatus::Pending, None) {
        report_status(deps.reporter, pr_url, &update).await;
    }

    let outcome = poller::poll_until_terminal(
        &options.poller,
        deps.platform,
        app_id,
        &release_id,
        &sleep_fn,
        shutdown,
    )
    .await;

    if let Some(update) = StatusUpdate::for_status(outcome.status, outcome.timeout_cause) {
        report_status(deps.reporter, pr_url, &update).await;
    }

    report.result = outcome.clone().into_result();
    report.outcome = Some(outcome);
    send_telemetry(options, deps, &report).await;
    report
}

/// Resolve the source blob and trigger the release, returning its ID
async fn trigger<S, F>(
    options: &AppOptions,
    deps: &Deps<'_>,
    sleep_fn: &S,
    shutdown: &mut Pin<Box<dyn Future<Output = ()> + Send>>,
    report: &mut DeployReport,
) -> Result<String, DeployError>
where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    let retry = options.retry();
    let platform = deps.platform;
    let app_id = options.platform.app_id.as_str();

    let source_blob_url = match &options.source {
        SourceOptions::BlobUrl(url) => url.clone(),
        SourceOptions::Artifact(path) => {
            let artifact = File::new(path).read_bytes().await?;
            let digest = sha256_hash(&artifact);
            info!(
                "Artifact {} ({} bytes, sha256 {})",
                path.display(),
                artifact.len(),
                digest
            );
            report.artifact_sha256 = Some(digest);

            let source = retry_transient("create build source", &retry, sleep_fn, shutdown, || {
                platform.create_source(app_id)
            })
            .await?;

            retry_transient("upload artifact", &retry, sleep_fn, shutdown, || {
                platform.upload_artifact(&source, &artifact)
            })
            .await?;

            source.download_url
        }
    };

    let attempt = ReleaseAttempt {
        source_blob_url,
        app_id: app_id.to_string(),
        triggering_pr_url: options.reporter.pr_url.clone(),
        run_id: options.run_id.clone(),
    };

    let version = options.source_version.as_deref();
    let release_id = retry_transient("trigger release", &retry, sleep_fn, shutdown, || {
        platform.trigger_release(&attempt.source_blob_url, &attempt.app_id, version)
    })
    .await?;

    info!(
        "Triggered release {} of {} (run {}, PR {})",
        release_id,
        attempt.app_id,
        attempt.run_id,
        attempt.triggering_pr_url.as_deref().unwrap_or("-")
    );
    Ok(release_id)
}

async fn send_telemetry(options: &AppOptions, deps: &Deps<'_>, report: &DeployReport) {
    let Some(sink) = deps.telemetry else {
        return;
    };

    let outcome = report.outcome.as_ref();
    let event = DeployEvent {
        event: EVENT_NAME.to_string(),
        run_id: report.run_id.clone(),
        app_id: options.platform.app_id.clone(),
        release_id: report.release_id.clone(),
        status: report.status_label().to_string(),
        polls: outcome.map(|o| o.polls).unwrap_or(0),
        elapsed_ms: outcome.map(|o| elapsed_ms(o.elapsed)).unwrap_or(0),
        max_consecutive_failures: outcome.map(|o| o.max_consecutive_failures).unwrap_or(0),
        pr_url: options.reporter.pr_url.clone(),
        artifact_sha256: report.artifact_sha256.clone(),
        host: host_info(),
        emitted_at: chrono::Utc::now(),
    };

    emit_event(sink, &event).await;
}

/// Milliseconds for the telemetry event, saturating at `u64::MAX`
fn elapsed_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
