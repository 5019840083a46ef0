//! Finite State Machine for release polling

use serde::{Deserialize, Serialize};

/// Why a deploy attempt timed out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutCause {
    /// Too many status queries failed in a row
    FailureCeiling,

    /// The wall-clock budget ran out
    Deadline,
}

/// Poll status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    /// Release triggered, not finished yet
    Pending,

    Succeeded,

    /// The platform reported a failed build
    Failed,

    TimedOut,

    /// Superseded by an external cancellation signal
    Cancelled,
}

impl PollStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PollStatus::Pending => "pending",
            PollStatus::Succeeded => "succeeded",
            PollStatus::Failed => "failed",
            PollStatus::TimedOut => "timed_out",
            PollStatus::Cancelled => "cancelled",
        }
    }
}

/// Poll event
#[derive(Debug, Clone)]
pub enum PollEvent {
    /// Status query answered "still building"
    Building,

    /// Status query answered "succeeded"
    Succeeded,

    /// Status query answered "failed"
    Failed(String),

    /// Status query failed
    TransientError(String),

    /// Wall-clock budget exhausted
    DeadlineExceeded,

    /// External cancellation
    Cancel,
}

/// Poll state for one release.
///
/// Mutated only by the poller loop. Once the status leaves `Pending` every
/// further event is rejected.
#[derive(Debug, Clone)]
pub struct PollState {
    status: PollStatus,
    consecutive_failures: u32,
    max_consecutive_failures: u32,
    peak_consecutive_failures: u32,
    timeout_cause: Option<TimeoutCause>,
    error: Option<String>,
}

impl PollState {
    /// Create a new FSM in pending state
    pub fn new(max_consecutive_failures: u32) -> Self {
        Self {
            status: PollStatus::Pending,
            consecutive_failures: 0,
            max_consecutive_failures: max_consecutive_failures.max(1),
            peak_consecutive_failures: 0,
            timeout_cause: None,
            error: None,
        }
    }

    /// Get current status
    pub fn status(&self) -> PollStatus {
        self.status
    }

    /// Failures since the last successful query
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Longest failure streak seen so far
    pub fn peak_consecutive_failures(&self) -> u32 {
        self.peak_consecutive_failures
    }

    pub fn timeout_cause(&self) -> Option<TimeoutCause> {
        self.timeout_cause
    }

    /// Last error message: the platform's failure message, or the last
    /// transient error
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: PollEvent) -> Result<PollStatus, String> {
        if self.status.is_terminal() {
            return Err(format!(
                "Invalid transition: {:?} -> {:?}",
                self.status, event
            ));
        }

        self.status = match event {
            PollEvent::Building => {
                self.consecutive_failures = 0;
                PollStatus::Pending
            }
            PollEvent::Succeeded => {
                self.consecutive_failures = 0;
                self.error = None;
                PollStatus::Succeeded
            }
            PollEvent::Failed(message) => {
                self.consecutive_failures = 0;
                self.error = Some(message);
                PollStatus::Failed
            }
            PollEvent::TransientError(message) => {
                self.consecutive_failures += 1;
                self.peak_consecutive_failures =
                    self.peak_consecutive_failures.max(self.consecutive_failures);
                self.error = Some(message);
                if self.consecutive_failures >= self.max_consecutive_failures {
                    self.timeout_cause = Some(TimeoutCause::FailureCeiling);
                    PollStatus::TimedOut
                } else {
                    PollStatus::Pending
                }
            }
            PollEvent::DeadlineExceeded => {
                self.timeout_cause = Some(TimeoutCause::Deadline);
                PollStatus::TimedOut
            }
            PollEvent::Cancel => PollStatus::Cancelled,
        };

        Ok(self.status)
    }
}
