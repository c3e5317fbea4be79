//! In-memory session store with idle expiry

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::RwLock;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::errors::LaunchError;
use crate::models::config::DeploymentConfig;
use crate::models::session::{DeploymentSession, LogEntry, SessionSnapshot, SessionStatus};
use crate::session::fsm::{self, SessionEvent};
use crate::utils::generate_uuid;

/// Session store settings
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// A session not mutated for this long is dropped
    pub idle_timeout: Duration,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(30 * 60),
        }
    }
}

struct StoreEntry {
    session: DeploymentSession,
    /// When the session expires
    deadline: Instant,
    /// Deadline of this session's live heap entry
    queued_at: Instant,
}

#[derive(Default)]
struct StoreInner {
    entries: HashMap<String, StoreEntry>,
    /// Min-heap of `(deadline, id)`. Heap items whose deadline no longer
    /// matches the entry's `queued_at` are stale and dropped when popped.
    deadlines: BinaryHeap<Reverse<(Instant, String)>>,
}

/// Authoritative map of deployment id to session
pub struct SessionStore {
    inner: RwLock<StoreInner>,
    settings: StoreSettings,
}

impl SessionStore {
    /// Create a new session store
    pub fn new(settings: StoreSettings) -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            settings,
        }
    }

    /// Idle window applied after every mutation
    pub fn idle_timeout(&self) -> Duration {
        self.settings.idle_timeout
    }

    /// Insert a fresh session in `deploying` state, generating an id when none is given
    pub fn create(
        &self,
        config: DeploymentConfig,
        id: Option<String>,
    ) -> Result<String, LaunchError> {
        let id = match id.map(|id| id.trim().to_string()) {
            Some(id) if id.is_empty() => {
                return Err(LaunchError::ValidationError(
                    "deployment id must not be empty".to_string(),
                ));
            }
            Some(id) => id,
            None => generate_uuid(),
        };

        let now = Instant::now();
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());

        if let Some(existing) = inner.entries.get(&id) {
            if existing.deadline > now {
                return Err(LaunchError::InvalidState(format!(
                    "deployment {} already exists",
                    id
                )));
            }
        }

        let deadline = now + self.settings.idle_timeout;
        inner.entries.insert(
            id.clone(),
            StoreEntry {
                session: DeploymentSession::new(id.clone(), config),
                deadline,
                queued_at: deadline,
            },
        );
        inner.deadlines.push(Reverse((deadline, id.clone())));

        debug!(deployment_id = %id, "Session created");
        Ok(id)
    }

    /// Get a copy of a live session
    pub fn get(&self, id: &str) -> Option<DeploymentSession> {
        let now = Instant::now();
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .entries
            .get(id)
            .filter(|entry| entry.deadline > now)
            .map(|entry| entry.session.clone())
    }

    /// Snapshot of a live session
    pub fn snapshot(&self, id: &str) -> Result<SessionSnapshot, LaunchError> {
        self.get(id)
            .map(|session| session.snapshot())
            .ok_or_else(|| LaunchError::SessionNotFound(id.to_string()))
    }

    /// Whether a live session exists for `id`
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Snapshots of all live sessions, oldest first
    pub fn list_all(&self) -> Vec<SessionSnapshot> {
        self.list_filtered(|_| true)
    }

    /// Snapshots of live sessions with the given status, oldest first
    pub fn list_by_status(&self, status: SessionStatus) -> Vec<SessionSnapshot> {
        self.list_filtered(|session| session.status == status)
    }

    fn list_filtered(&self, keep: impl Fn(&DeploymentSession) -> bool) -> Vec<SessionSnapshot> {
        let now = Instant::now();
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut sessions: Vec<SessionSnapshot> = inner
            .entries
            .values()
            .filter(|entry| entry.deadline > now && keep(&entry.session))
            .map(|entry| entry.session.snapshot())
            .collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        sessions
    }

    /// Record the compute resource name. It can be set once and never changed.
    pub fn set_resource_name(&self, id: &str, name: &str) -> Result<(), LaunchError> {
        self.mutate(id, |session| match &session.resource_name {
            Some(existing) if existing != name => Err(LaunchError::InvalidState(format!(
                "resource name already set to {}",
                existing
            ))),
            _ => {
                session.resource_name = Some(name.to_string());
                Ok(())
            }
        })
    }

    /// Record the instance network address
    pub fn set_address(&self, id: &str, address: &str) -> Result<(), LaunchError> {
        self.mutate(id, |session| {
            session.address = Some(address.to_string());
            Ok(())
        })
    }

    /// Record the registered hostname
    pub fn set_hostname(&self, id: &str, hostname: &str) -> Result<(), LaunchError> {
        self.mutate(id, |session| {
            session.hostname = Some(hostname.to_string());
            Ok(())
        })
    }

    /// Append an execution record to the session log
    pub fn append_log(&self, id: &str, entry: LogEntry) -> Result<(), LaunchError> {
        self.mutate(id, |session| {
            session.log_entries.push(entry);
            Ok(())
        })
    }

    /// Apply a status event, returning the new status
    pub fn transition(&self, id: &str, event: SessionEvent) -> Result<SessionStatus, LaunchError> {
        self.mutate(id, |session| {
            let succeeds = matches!(event, SessionEvent::Provisioned | SessionEvent::Redeployed);
            if succeeds && (session.resource_name.is_none() || session.hostname.is_none()) {
                return Err(LaunchError::InvalidState(
                    "cannot mark a deployment successful without resource name and hostname"
                        .to_string(),
                ));
            }

            if event == SessionEvent::Redeploy && !session.is_provisioned() {
                return Err(LaunchError::InvalidState(
                    "cannot redeploy a deployment that was never provisioned".to_string(),
                ));
            }

            let next = fsm::transition(session.status, &event)?;
            let now = Utc::now();
            match &event {
                SessionEvent::Failed(message) => session.error = Some(message.clone()),
                SessionEvent::Provisioned => {
                    session.provisioned_at = Some(now);
                    session.error = None;
                }
                _ => session.error = None,
            }
            session.status = next;
            session.last_action_at = Some(now);
            Ok(next)
        })
    }

    /// Refresh the idle deadline without changing anything else
    pub fn touch(&self, id: &str) -> Result<(), LaunchError> {
        self.mutate(id, |_| Ok(()))
    }

    /// Remove a session
    pub fn delete(&self, id: &str) -> Option<DeploymentSession> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let removed = inner.entries.remove(id).map(|entry| entry.session);
        if removed.is_some() {
            debug!(deployment_id = %id, "Session removed");
        }
        removed
    }

    /// Drop every session whose deadline has passed, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let StoreInner { entries, deadlines } = &mut *inner;

        let mut removed = 0;
        while let Some(Reverse((due, _))) = deadlines.peek() {
            if *due > now {
                break;
            }
            let Some(Reverse((due, id))) = deadlines.pop() else {
                break;
            };

            let Some(entry) = entries.get_mut(&id) else {
                continue;
            };
            if entry.queued_at != due {
                continue;
            }

            if entry.deadline <= now {
                entries.remove(&id);
                removed += 1;
                info!(deployment_id = %id, "Session expired");
            } else {
                entry.queued_at = entry.deadline;
                deadlines.push(Reverse((entry.deadline, id)));
            }
        }

        removed
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.entries.values().filter(|e| e.deadline > now).count()
    }

    /// Check if the store has no live sessions
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn mutate<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut DeploymentSession) -> Result<R, LaunchError>,
    ) -> Result<R, LaunchError> {
        let now = Instant::now();
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());

        let entry = inner
            .entries
            .get_mut(id)
            .filter(|entry| entry.deadline > now)
            .ok_or_else(|| LaunchError::SessionNotFound(id.to_string()))?;

        let result = f(&mut entry.session)?;
        // Reset, not extend: the deadline is always measured from this mutation.
        entry.deadline = now + self.settings.idle_timeout;
        Ok(result)
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(StoreSettings::default())
    }
}
