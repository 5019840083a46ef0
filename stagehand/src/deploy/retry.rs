//! Fixed-interval retry of transient platform errors

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{info, warn};

use crate::errors::DeployError;

/// Retry options
#[derive(Debug, Clone)]
pub struct Options {
    /// Delay between attempts
    pub interval: Duration,

    /// Attempts before giving up, at least one
    pub max_attempts: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_attempts: 15,
        }
    }
}

/// Run `op` until it succeeds, fails with a non-transient error, or
/// `max_attempts` transient failures have happened in a row.
///
/// The shutdown signal is checked while the operation is in flight and while
/// waiting between attempts; it yields `DeployError::Cancelled`.
pub async fn retry_transient<T, Op, Fut, S, F>(
    label: &str,
    options: &Options,
    sleep_fn: &S,
    shutdown_signal: &mut Pin<Box<dyn Future<Output = ()> + Send>>,
    mut op: Op,
) -> Result<T, DeployError>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DeployError>>,
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    let max_attempts = options.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let result = tokio::select! {
            biased;
            _ = &mut *shutdown_signal => {
                info!("Cancelled during {}", label);
                return Err(DeployError::Cancelled);
            }
            result = op() => result,
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                warn!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {}",
                    label, attempt, max_attempts, options.interval, e
                );
            }
            Err(e) if e.is_transient() => {
                return Err(DeployError::PlatformUnavailable(format!(
                    "{} gave up after {} attempts: {}",
                    label, attempt, e
                )));
            }
            Err(e) => return Err(e),
        }

        tokio::select! {
            biased;
            _ = &mut *shutdown_signal => {
                info!("Cancelled while waiting to retry {}", label);
                return Err(DeployError::Cancelled);
            }
            _ = sleep_fn(options.interval) => {}
        }
    }
}
