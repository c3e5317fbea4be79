//! Finite state machine for deployment session status

use crate::errors::LaunchError;
use crate::models::session::SessionStatus;

/// Status-changing event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Provisioning finished with resource and hostname in place
    Provisioned,

    /// Start a redeploy of an existing instance
    Redeploy,

    /// Redeploy finished
    Redeployed,

    /// The running workflow failed
    Failed(String),
}

/// Compute the status reached by applying `event` to `status`.
///
/// Returns [`LaunchError::InvalidState`] for every pair the lifecycle does not
/// allow.
pub fn transition(status: SessionStatus, event: &SessionEvent) -> Result<SessionStatus, LaunchError> {
    let next = match (status, event) {
        // From Deploying
        (SessionStatus::Deploying, SessionEvent::Provisioned) => SessionStatus::Success,
        (SessionStatus::Deploying, SessionEvent::Failed(_)) => SessionStatus::Failed,

        // From Success / Failed
        (SessionStatus::Success, SessionEvent::Redeploy) => SessionStatus::Redeploying,
        (SessionStatus::Failed, SessionEvent::Redeploy) => SessionStatus::Redeploying,

        // From Redeploying
        (SessionStatus::Redeploying, SessionEvent::Redeployed) => SessionStatus::Success,
        (SessionStatus::Redeploying, SessionEvent::Failed(_)) => SessionStatus::Failed,

        (status, event) => {
            return Err(LaunchError::InvalidState(format!(
                "cannot apply {:?} while {}",
                event, status
            )));
        }
    };

    Ok(next)
}
