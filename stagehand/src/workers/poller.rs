//! Release status poller

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::deploy::fsm::{PollEvent, PollState, PollStatus, TimeoutCause};
use crate::errors::DeployError;
use crate::http::platform::PlatformApi;
use crate::models::release::ReleaseStatus;

/// Poller options
#[derive(Debug, Clone)]
pub struct Options {
    /// Delay between status queries
    pub interval: Duration,

    /// Failed queries in a row before the attempt times out
    pub max_consecutive_failures: u32,

    /// Wall-clock budget for the whole polling phase
    pub timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_consecutive_failures: 15,
            timeout: Duration::from_secs(300), // 5 minutes
        }
    }
}

/// Summary of a finished polling loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    pub status: PollStatus,

    /// Status queries issued
    pub polls: u32,

    /// Longest run of failed queries
    pub max_consecutive_failures: u32,

    pub elapsed: Duration,

    pub timeout_cause: Option<TimeoutCause>,

    /// Platform failure message, or the last transient error on timeout
    pub message: Option<String>,
}

impl PollOutcome {
    /// Map the outcome onto the error taxonomy; `Ok` only on success
    pub fn into_result(self) -> Result<(), DeployError> {
        let message = self.message.unwrap_or_default();
        match self.status {
            PollStatus::Succeeded => Ok(()),
            PollStatus::Failed => Err(DeployError::BuildFailed(message)),
            PollStatus::TimedOut => {
                let reason = match self.timeout_cause {
                    Some(TimeoutCause::FailureCeiling) => format!(
                        "{} consecutive status queries failed, last error: {}",
                        self.max_consecutive_failures, message
                    ),
                    _ => format!("no terminal status after {:?}", self.elapsed),
                };
                Err(DeployError::PollTimeout(reason))
            }
            PollStatus::Cancelled => Err(DeployError::Cancelled),
            PollStatus::Pending => Err(DeployError::InvalidTransition(
                "poll loop ended while pending".to_string(),
            )),
        }
    }
}

/// Poll a release until the platform reports a terminal status, the failure
/// ceiling or wall-clock budget is exhausted, or the shutdown signal fires.
pub async fn poll_until_terminal<P, S, F>(
    options: &Options,
    platform: &P,
    app_id: &str,
    release_id: &str,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) -> PollOutcome
where
    P: PlatformApi + ?Sized,
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!(
        "Polling release {} of {} every {:?} (ceiling {}, timeout {:?})",
        release_id, app_id, options.interval, options.max_consecutive_failures, options.timeout
    );

    let started = Instant::now();
    // A budget too large to represent on the clock never expires
    let deadline = started.checked_add(options.timeout);
    let mut state = PollState::new(options.max_consecutive_failures);
    let mut polls = 0;

    loop {
        let event = if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            PollEvent::DeadlineExceeded
        } else {
            let remaining = remaining_budget(deadline);
            polls += 1;

            tokio::select! {
                biased;
                _ = &mut shutdown_signal => PollEvent::Cancel,
                result = tokio::time::timeout(remaining, platform.release_status(app_id, release_id)) => {
                    match result {
                        Ok(Ok(ReleaseStatus::Building)) => PollEvent::Building,
                        Ok(Ok(ReleaseStatus::Succeeded)) => PollEvent::Succeeded,
                        Ok(Ok(ReleaseStatus::Failed(message))) => PollEvent::Failed(message),
                        Ok(Err(e)) => PollEvent::TransientError(e.to_string()),
                        Err(_) => PollEvent::TransientError(
                            "status query cut short by the deploy deadline".to_string(),
                        ),
                    }
                }
            }
        };

        if let PollEvent::TransientError(message) = &event {
            warn!(
                "Status query {} failed ({} in a row): {}",
                polls,
                state.consecutive_failures() + 1,
                message
            );
        }

        // Every event is processed while pending, so this cannot fail
        let status = match state.process(event) {
            Ok(status) => status,
            Err(e) => {
                warn!("{}", e);
                state.status()
            }
        };

        if status.is_terminal() {
            break;
        }
        debug!("Release {} still building (poll {})", release_id, polls);

        let remaining = remaining_budget(deadline);
        tokio::select! {
            biased;
            _ = &mut shutdown_signal => {
                // Cannot fail while pending
                let _ = state.process(PollEvent::Cancel);
                break;
            }
            _ = sleep_fn(options.interval.min(remaining)) => {}
        }
    }

    let outcome = PollOutcome {
        status: state.status(),
        polls,
        max_consecutive_failures: state.peak_consecutive_failures(),
        elapsed: started.elapsed(),
        timeout_cause: state.timeout_cause(),
        message: state.error().map(str::to_string),
    };

    info!(
        "Release {} finished as {} after {} polls in {:?}",
        release_id,
        outcome.status.as_str(),
        outcome.polls,
        outcome.elapsed
    );
    outcome
}

/// Time left before `deadline`, unbounded when there is none
fn remaining_budget(deadline: Option<Instant>) -> Duration {
    match deadline {
        Some(deadline) => deadline.saturating_duration_since(Instant::now()),
        None => Duration::MAX,
    }
}
