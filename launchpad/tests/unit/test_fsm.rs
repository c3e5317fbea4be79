//! Status state machine tests

use launchpad::errors::LaunchError;
use launchpad::models::session::SessionStatus;
use launchpad::session::fsm::{transition, SessionEvent};

#[test]
fn test_allowed_paths() {
    let cases = [
        (SessionStatus::Deploying, SessionEvent::Provisioned, SessionStatus::Success),
        (SessionStatus::Deploying, SessionEvent::Failed("x".into()), SessionStatus::Failed),
        (SessionStatus::Success, SessionEvent::Redeploy, SessionStatus::Redeploying),
        (SessionStatus::Failed, SessionEvent::Redeploy, SessionStatus::Redeploying),
        (SessionStatus::Redeploying, SessionEvent::Redeployed, SessionStatus::Success),
        (SessionStatus::Redeploying, SessionEvent::Failed("x".into()), SessionStatus::Failed),
    ];

    for (from, event, to) in cases {
        assert_eq!(transition(from, &event).unwrap(), to, "{} + {:?}", from, event);
    }
}

#[test]
fn test_rejected_paths() {
    let cases = [
        (SessionStatus::Deploying, SessionEvent::Redeploy),
        (SessionStatus::Deploying, SessionEvent::Redeployed),
        (SessionStatus::Redeploying, SessionEvent::Redeploy),
        (SessionStatus::Redeploying, SessionEvent::Provisioned),
        (SessionStatus::Success, SessionEvent::Provisioned),
        (SessionStatus::Success, SessionEvent::Failed("x".into())),
        (SessionStatus::Failed, SessionEvent::Redeployed),
    ];

    for (from, event) in cases {
        assert!(
            matches!(transition(from, &event), Err(LaunchError::InvalidState(_))),
            "{} + {:?} should be rejected",
            from,
            event
        );
    }
}

#[test]
fn test_status_parsing() {
    assert_eq!("success".parse::<SessionStatus>().unwrap(), SessionStatus::Success);
    assert_eq!("REDEPLOYING".parse::<SessionStatus>().unwrap(), SessionStatus::Redeploying);
    assert!("done".parse::<SessionStatus>().is_err());
    assert!(SessionStatus::Deploying.is_in_flight());
    assert!(!SessionStatus::Failed.is_in_flight());
}
