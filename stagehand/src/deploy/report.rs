//! Best-effort status reporting

use platform_models::CommitState;
use tracing::{debug, info, warn};

use crate::deploy::fsm::{PollStatus, TimeoutCause};
use crate::errors::DeployError;
use crate::http::github::StatusReporter;

/// A status to publish on the change request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub state: CommitState,
    pub description: String,
}

impl StatusUpdate {
    /// Status for a poll state. `None` for cancelled attempts, which leave
    /// reporting to the attempt that superseded them.
    pub fn for_status(status: PollStatus, timeout_cause: Option<TimeoutCause>) -> Option<Self> {
        let (state, description) = match status {
            PollStatus::Pending => (CommitState::Pending, "Deploying to staging".to_string()),
            PollStatus::Succeeded => (CommitState::Success, "Deployed to staging".to_string()),
            PollStatus::Failed => (CommitState::Failure, "Staging build failed".to_string()),
            PollStatus::TimedOut => {
                let description = match timeout_cause {
                    Some(TimeoutCause::FailureCeiling) => {
                        "Deploy timed out: platform unreachable".to_string()
                    }
                    _ => "Deploy timed out waiting for the platform".to_string(),
                };
                (CommitState::Error, description)
            }
            PollStatus::Cancelled => return None,
        };
        Some(Self { state, description })
    }

    /// Status for an attempt that never reached the platform
    pub fn setup_error(err: &DeployError) -> Self {
        let mut description = format!("Deploy could not start: {}", err);
        // Commit status descriptions are capped at 140 characters
        if description.chars().count() > 140 {
            description = description.chars().take(137).collect::<String>() + "...";
        }
        Self {
            state: CommitState::Error,
            description,
        }
    }
}

/// Publish a status update. Failures are logged and swallowed.
pub async fn report_status<R>(reporter: Option<&R>, pr_url: Option<&str>, update: &StatusUpdate)
where
    R: StatusReporter + ?Sized,
{
    let (Some(reporter), Some(pr_url)) = (reporter, pr_url) else {
        debug!("Status reporting disabled, skipping {:?}", update.state);
        return;
    };

    match reporter.report_status(pr_url, update).await {
        Ok(()) => info!("Reported {:?} status to {}", update.state, pr_url),
        Err(e) => warn!("Failed to report {:?} status to {}: {}", update.state, pr_url, e),
    }
}
