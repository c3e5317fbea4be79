//! Single-writer leases for deployments

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Set of deployment ids with a workflow in flight
#[derive(Clone, Default)]
pub struct WorkflowLeases {
    active: Arc<Mutex<HashSet<String>>>,
}

impl WorkflowLeases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id` for one workflow. Returns `None` while another holds it.
    pub fn try_acquire(&self, id: &str) -> Option<WorkflowLease> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if !active.insert(id.to_string()) {
            return None;
        }
        Some(WorkflowLease {
            id: id.to_string(),
            leases: self.clone(),
        })
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(id)
    }
}

/// Held by a running workflow, released on drop
pub struct WorkflowLease {
    id: String,
    leases: WorkflowLeases,
}

impl WorkflowLease {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for WorkflowLease {
    fn drop(&mut self) {
        self.leases
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.id);
    }
}
