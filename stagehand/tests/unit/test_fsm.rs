//! FSM unit tests

use stagehand::deploy::fsm::{PollEvent, PollState, PollStatus, TimeoutCause};

#[test]
fn test_fsm_initial_state() {
    let fsm = PollState::new(15);
    assert_eq!(fsm.status(), PollStatus::Pending);
    assert!(fsm.error().is_none());
    assert_eq!(fsm.consecutive_failures(), 0);
    assert!(fsm.timeout_cause().is_none());
}

#[test]
fn test_fsm_success_flow() {
    let mut fsm = PollState::new(15);

    // Pending -> Pending
    for _ in 0..14 {
        fsm.process(PollEvent::Building).unwrap();
    }
    assert_eq!(fsm.status(), PollStatus::Pending);

    // Pending -> Succeeded
    fsm.process(PollEvent::Succeeded).unwrap();
    assert_eq!(fsm.status(), PollStatus::Succeeded);
    assert_eq!(fsm.peak_consecutive_failures(), 0);
}

#[test]
fn test_fsm_build_failure_flow() {
    let mut fsm = PollState::new(15);

    fsm.process(PollEvent::Failed("build b-1 failed".to_string())).unwrap();

    assert_eq!(fsm.status(), PollStatus::Failed);
    assert_eq!(fsm.error(), Some("build b-1 failed"));
    assert!(fsm.timeout_cause().is_none());
}

#[test]
fn test_fsm_success_resets_failure_counter() {
    let mut fsm = PollState::new(3);

    fsm.process(PollEvent::TransientError("502".to_string())).unwrap();
    fsm.process(PollEvent::TransientError("502".to_string())).unwrap();
    assert_eq!(fsm.consecutive_failures(), 2);

    // "still building" counts as a successful query
    fsm.process(PollEvent::Building).unwrap();
    assert_eq!(fsm.consecutive_failures(), 0);

    fsm.process(PollEvent::TransientError("502".to_string())).unwrap();
    fsm.process(PollEvent::TransientError("502".to_string())).unwrap();
    assert_eq!(fsm.status(), PollStatus::Pending);
    assert_eq!(fsm.peak_consecutive_failures(), 2);
}

#[test]
fn test_fsm_ceiling_times_out() {
    let mut fsm = PollState::new(15);

    for _ in 0..14 {
        fsm.process(PollEvent::TransientError("connection reset".to_string()))
            .unwrap();
    }
    assert_eq!(fsm.status(), PollStatus::Pending);

    fsm.process(PollEvent::TransientError("connection reset".to_string()))
        .unwrap();
    assert_eq!(fsm.status(), PollStatus::TimedOut);
    assert_eq!(fsm.timeout_cause(), Some(TimeoutCause::FailureCeiling));
    assert_eq!(fsm.peak_consecutive_failures(), 15);
}

#[test]
fn test_fsm_deadline_times_out() {
    let mut fsm = PollState::new(15);

    fsm.process(PollEvent::TransientError("502".to_string())).unwrap();
    fsm.process(PollEvent::DeadlineExceeded).unwrap();

    assert_eq!(fsm.status(), PollStatus::TimedOut);
    assert_eq!(fsm.timeout_cause(), Some(TimeoutCause::Deadline));
}

#[test]
fn test_fsm_cancel() {
    let mut fsm = PollState::new(15);
    fsm.process(PollEvent::Cancel).unwrap();
    assert_eq!(fsm.status(), PollStatus::Cancelled);
}

#[test]
fn test_fsm_terminal_states_are_final() {
    let terminal_events = [
        PollEvent::Succeeded,
        PollEvent::Failed("failed".to_string()),
        PollEvent::DeadlineExceeded,
        PollEvent::Cancel,
    ];

    for terminal in terminal_events {
        let mut fsm = PollState::new(15);
        let status = fsm.process(terminal).unwrap();

        // No transition leaves a terminal state
        assert!(fsm.process(PollEvent::Building).is_err());
        assert!(fsm.process(PollEvent::Succeeded).is_err());
        assert!(fsm.process(PollEvent::TransientError("late".to_string())).is_err());
        assert_eq!(fsm.status(), status);
    }
}
