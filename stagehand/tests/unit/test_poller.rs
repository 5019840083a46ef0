//! Poller tests, driven on a paused clock

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use stagehand::app::options::AppOptions;
use stagehand::deploy::fsm::{PollStatus, TimeoutCause};
use stagehand::models::release::ReleaseStatus;
use stagehand::storage::settings::Settings;
use stagehand::workers::poller::{poll_until_terminal, Options, PollOutcome};

use crate::support::{settings, unavailable, ScriptedPlatform, APP_ID};

fn never() -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(std::future::pending())
}

fn options(max_consecutive_failures: u32, timeout: Duration) -> Options {
    Options {
        interval: Duration::from_secs(10),
        max_consecutive_failures,
        timeout,
    }
}

async fn poll(platform: &ScriptedPlatform, options: &Options) -> PollOutcome {
    poll_until_terminal(options, platform, APP_ID, "build-1", tokio::time::sleep, never()).await
}

#[tokio::test(start_paused = true)]
async fn test_building_then_succeeded() {
    let mut script: Vec<_> = (0..14).map(|_| Ok(ReleaseStatus::Building)).collect();
    script.push(Ok(ReleaseStatus::Succeeded));
    let platform = ScriptedPlatform::new(script);

    let outcome = poll(&platform, &options(15, Duration::from_secs(300))).await;

    assert_eq!(outcome.status, PollStatus::Succeeded);
    assert_eq!(outcome.polls, 15);
    assert_eq!(outcome.max_consecutive_failures, 0);
    assert!(outcome.message.is_none());
    assert_eq!(platform.status_calls(), 15);
}

#[tokio::test(start_paused = true)]
async fn test_failures_below_ceiling_then_success() {
    // Two runs of 14 failures, each broken by a successful query
    let mut script = Vec::new();
    for _ in 0..2 {
        script.extend((0..14).map(|_| Err(unavailable())));
        script.push(Ok(ReleaseStatus::Building));
    }
    script.push(Ok(ReleaseStatus::Succeeded));
    let platform = ScriptedPlatform::new(script);

    let outcome = poll(&platform, &options(15, Duration::from_secs(3600))).await;

    assert_eq!(outcome.status, PollStatus::Succeeded);
    assert_eq!(outcome.polls, 31);
    assert_eq!(outcome.max_consecutive_failures, 14);
}

#[tokio::test(start_paused = true)]
async fn test_failures_at_ceiling_time_out() {
    let script = (0..15).map(|_| Err(unavailable())).collect();
    let platform = ScriptedPlatform::new(script);

    let outcome = poll(&platform, &options(15, Duration::from_secs(300))).await;

    assert_eq!(outcome.status, PollStatus::TimedOut);
    assert_eq!(outcome.timeout_cause, Some(TimeoutCause::FailureCeiling));
    assert_eq!(outcome.polls, 15);
    assert_eq!(outcome.max_consecutive_failures, 15);
    assert!(outcome.message.unwrap().contains("502"));
}

#[tokio::test(start_paused = true)]
async fn test_failed_on_first_poll() {
    let platform = ScriptedPlatform::new(vec![
        Ok(ReleaseStatus::Failed("build build-1 failed".to_string())),
        Ok(ReleaseStatus::Succeeded),
    ]);

    let outcome = poll(&platform, &options(15, Duration::from_secs(300))).await;

    assert_eq!(outcome.status, PollStatus::Failed);
    assert_eq!(outcome.message.as_deref(), Some("build build-1 failed"));
    assert_eq!(outcome.polls, 1);
    assert_eq!(platform.status_calls(), 1);
    assert_eq!(outcome.elapsed, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_times_out_while_building() {
    let platform = ScriptedPlatform::new(Vec::new());

    let outcome = poll(&platform, &options(15, Duration::from_secs(60))).await;

    assert_eq!(outcome.status, PollStatus::TimedOut);
    assert_eq!(outcome.timeout_cause, Some(TimeoutCause::Deadline));
    // Queries at 0s, 10s, ..., 50s
    assert_eq!(outcome.polls, 6);
    assert!(outcome.elapsed >= Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_wins_over_failure_counter() {
    // Failures alternate with successes so the ceiling is never reached
    let script = (0..100)
        .map(|i| if i % 2 == 0 { Err(unavailable()) } else { Ok(ReleaseStatus::Building) })
        .collect();
    let platform = ScriptedPlatform::new(script);

    let outcome = poll(&platform, &options(2, Duration::from_secs(95))).await;

    assert_eq!(outcome.status, PollStatus::TimedOut);
    assert_eq!(outcome.timeout_cause, Some(TimeoutCause::Deadline));
    assert_eq!(outcome.max_consecutive_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_query_is_cut_at_deadline() {
    let platform = ScriptedPlatform::new(Vec::new()).with_status_delay(Duration::from_secs(120));

    let outcome = poll(&platform, &options(15, Duration::from_secs(60))).await;

    assert_eq!(outcome.status, PollStatus::TimedOut);
    assert_eq!(outcome.timeout_cause, Some(TimeoutCause::Deadline));
    assert_eq!(outcome.polls, 1);
    assert!(outcome.elapsed < Duration::from_secs(120));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_between_polls() {
    let platform = ScriptedPlatform::new(Vec::new());
    let shutdown = Box::pin(tokio::time::sleep(Duration::from_secs(25)));

    let outcome = poll_until_terminal(
        &options(15, Duration::from_secs(300)),
        &platform,
        APP_ID,
        "build-1",
        tokio::time::sleep,
        shutdown,
    )
    .await;

    assert_eq!(outcome.status, PollStatus::Cancelled);
    // Queries at 0s, 10s and 20s, cancelled during the wait for 30s
    assert_eq!(outcome.polls, 3);
    assert_eq!(platform.status_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_during_query() {
    let platform = ScriptedPlatform::new(Vec::new()).with_status_delay(Duration::from_secs(30));
    let shutdown = Box::pin(tokio::time::sleep(Duration::from_secs(5)));

    let outcome = poll_until_terminal(
        &options(15, Duration::from_secs(300)),
        &platform,
        APP_ID,
        "build-1",
        tokio::time::sleep,
        shutdown,
    )
    .await;

    assert_eq!(outcome.status, PollStatus::Cancelled);
    assert_eq!(outcome.polls, 1);
    assert!(outcome.elapsed < Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_unrepresentable_timeout_never_expires() {
    let settings = Settings {
        deploy_timeout_secs: u64::MAX,
        ..settings()
    };
    let options = AppOptions::from_settings(&settings).unwrap();

    let mut script: Vec<_> = (0..3).map(|_| Ok(ReleaseStatus::Building)).collect();
    script.push(Err(unavailable()));
    script.push(Ok(ReleaseStatus::Succeeded));
    let platform = ScriptedPlatform::new(script);

    let outcome = poll(&platform, &options.poller).await;

    assert_eq!(outcome.status, PollStatus::Succeeded);
    assert_eq!(outcome.polls, 5);
    assert!(outcome.timeout_cause.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_unbounded_timeout_still_hits_failure_ceiling() {
    let script = (0..15).map(|_| Err(unavailable())).collect();
    let platform = ScriptedPlatform::new(script);

    let outcome = poll(&platform, &options(15, Duration::MAX)).await;

    assert_eq!(outcome.status, PollStatus::TimedOut);
    assert_eq!(outcome.timeout_cause, Some(TimeoutCause::FailureCeiling));
    assert_eq!(outcome.polls, 15);
}
