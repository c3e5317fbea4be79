//! In-process collaborators for local runs and tests
//!
//! Every simulated collaborator keeps a journal of the calls it received and
//! can be told to fail specific operations.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::errors::LaunchError;
use crate::providers::dns::NameRecordClient;
use crate::providers::provisioner::{InstanceInfo, InstanceSpec, InstanceState, ProvisionerClient};
use crate::providers::remote::{normalize_private_key, CommandOutput, RemoteConnector, RemoteExecutor};

/// Shared, ordered record of calls
#[derive(Debug, Clone, Default)]
pub struct Journal {
    calls: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    fn record(&self, call: impl Into<String>) {
        let call = call.into();
        // arguments can carry credentials, only the verb is logged
        let verb = call.split_whitespace().next().unwrap_or_default();
        debug!(call = verb, "Simulated call");
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }

    /// All calls so far, oldest first
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Whether any call starts with `prefix`
    pub fn contains(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }
}

// =============================== PROVISIONER ================================== //

/// Behaviour knobs for [`SimulatedProvisioner`]
#[derive(Debug, Clone)]
pub struct ProvisionerBehavior {
    /// Address handed to every instance
    pub address: String,

    /// Describe calls reporting `pending` before the instance runs
    pub pending_polls: u32,

    /// Report `running` but never assign an address
    pub withhold_address: bool,

    pub fail_create: bool,
    pub fail_open_ports: bool,
    pub fail_delete: bool,
}

impl Default for ProvisionerBehavior {
    fn default() -> Self {
        Self {
            address: "203.0.113.10".to_string(),
            pending_polls: 0,
            withhold_address: false,
            fail_create: false,
            fail_open_ports: false,
            fail_delete: false,
        }
    }
}

#[derive(Debug)]
struct SimInstance {
    polls: u32,
}

/// Provisioner that keeps instances in memory
#[derive(Default)]
pub struct SimulatedProvisioner {
    behavior: Mutex<ProvisionerBehavior>,
    instances: Mutex<HashMap<String, SimInstance>>,
    journal: Journal,
}

impl SimulatedProvisioner {
    pub fn new(behavior: ProvisionerBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            ..Default::default()
        }
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Change behaviour for subsequent calls
    pub fn set_behavior(&self, behavior: ProvisionerBehavior) {
        *self.behavior.lock().unwrap_or_else(|e| e.into_inner()) = behavior;
    }

    /// Whether an instance with this name currently exists
    pub fn has_instance(&self, name: &str) -> bool {
        self.instances
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }

    fn behavior(&self) -> ProvisionerBehavior {
        self.behavior.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl ProvisionerClient for SimulatedProvisioner {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn create_instance(&self, name: &str, _spec: &InstanceSpec) -> Result<(), LaunchError> {
        self.journal.record(format!("create_instance {}", name));
        if self.behavior().fail_create {
            return Err(LaunchError::ProvisionError(format!("quota exceeded creating {}", name)));
        }

        let mut instances = self.instances.lock().unwrap_or_else(|e| e.into_inner());
        if instances.contains_key(name) {
            return Err(LaunchError::ProvisionError(format!("instance {} already exists", name)));
        }
        instances.insert(name.to_string(), SimInstance { polls: 0 });
        Ok(())
    }

    async fn describe_instance(&self, name: &str) -> Result<InstanceInfo, LaunchError> {
        self.journal.record(format!("describe_instance {}", name));
        let behavior = self.behavior();

        let mut instances = self.instances.lock().unwrap_or_else(|e| e.into_inner());
        let instance = instances
            .get_mut(name)
            .ok_or_else(|| LaunchError::ProvisionError(format!("instance {} not found", name)))?;
        instance.polls += 1;

        let running = instance.polls > behavior.pending_polls;
        Ok(InstanceInfo {
            name: name.to_string(),
            state: if running {
                InstanceState::Running
            } else {
                InstanceState::Pending
            },
            address: (running && !behavior.withhold_address).then(|| format!("{}:22", behavior.address)),
        })
    }

    async fn open_all_network_access(&self, name: &str) -> Result<(), LaunchError> {
        self.journal.record(format!("open_all_network_access {}", name));
        if self.behavior().fail_open_ports {
            return Err(LaunchError::ProvisionError(format!("cannot open ports on {}", name)));
        }
        Ok(())
    }

    async fn delete_instance(&self, name: &str) -> Result<(), LaunchError> {
        self.journal.record(format!("delete_instance {}", name));
        if self.behavior().fail_delete {
            return Err(LaunchError::ProvisionError(format!("cannot delete {}", name)));
        }
        self.instances
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name);
        Ok(())
    }
}

// ==================================== DNS ====================================== //

/// DNS provider that keeps records in memory
#[derive(Default)]
pub struct SimulatedDns {
    records: Mutex<HashMap<String, String>>,
    fail_create: Mutex<bool>,
    fail_delete: Mutex<bool>,
    journal: Journal,
}

impl SimulatedDns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn set_fail_create(&self, fail: bool) {
        *self.fail_create.lock().unwrap_or_else(|e| e.into_inner()) = fail;
    }

    pub fn set_fail_delete(&self, fail: bool) {
        *self.fail_delete.lock().unwrap_or_else(|e| e.into_inner()) = fail;
    }

    /// Address a hostname currently points at
    pub fn record(&self, hostname: &str) -> Option<String> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(hostname)
            .cloned()
    }
}

#[async_trait]
impl NameRecordClient for SimulatedDns {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn create_record(&self, hostname: &str, address: &str) -> Result<String, LaunchError> {
        self.journal.record(format!("create_record {} {}", hostname, address));
        if *self.fail_create.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(LaunchError::NameRecordError(format!("zone rejected {}", hostname)));
        }
        let canonical = hostname.trim_end_matches('.').to_lowercase();
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(canonical.clone(), address.to_string());
        Ok(canonical)
    }

    async fn delete_record(&self, hostname: &str) -> Result<(), LaunchError> {
        self.journal.record(format!("delete_record {}", hostname));
        if *self.fail_delete.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(LaunchError::NameRecordError(format!("cannot delete {}", hostname)));
        }
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&hostname.trim_end_matches('.').to_lowercase());
        Ok(())
    }
}

// =================================== REMOTE ==================================== //

#[derive(Debug, Default)]
struct RemoteScript {
    fail_connect: bool,
    /// Command substrings that exit non-zero
    failing: HashSet<String>,
}

/// Remote executor factory whose executors only record commands
#[derive(Clone, Default)]
pub struct SimulatedRemote {
    script: Arc<Mutex<RemoteScript>>,
    journal: Journal,
}

impl SimulatedRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.script.lock().unwrap_or_else(|e| e.into_inner()).fail_connect = fail;
    }

    /// Make every command containing `fragment` exit with status 1
    pub fn fail_commands_containing(&self, fragment: &str) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .failing
            .insert(fragment.to_string());
    }

    /// Commands executed so far
    pub fn executed(&self) -> Vec<String> {
        self.journal
            .calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix("execute ").map(str::to_string))
            .collect()
    }
}

impl RemoteConnector for SimulatedRemote {
    fn executor(&self) -> Box<dyn RemoteExecutor> {
        Box::new(SimulatedExecutor {
            remote: self.clone(),
            connected: false,
        })
    }
}

struct SimulatedExecutor {
    remote: SimulatedRemote,
    connected: bool,
}

#[async_trait]
impl RemoteExecutor for SimulatedExecutor {
    async fn connect(&mut self, address: &str, private_key: &SecretString) -> Result<(), LaunchError> {
        self.remote.journal.record(format!("connect {}", address));
        normalize_private_key(private_key.expose_secret())?;
        if self.remote.script.lock().unwrap_or_else(|e| e.into_inner()).fail_connect {
            return Err(LaunchError::RemoteExecutionError(format!(
                "connection to {} refused",
                address
            )));
        }
        self.connected = true;
        Ok(())
    }

    async fn execute(&mut self, command: &str) -> Result<CommandOutput, LaunchError> {
        if !self.connected {
            return Err(LaunchError::RemoteExecutionError("not connected".to_string()));
        }
        self.remote.journal.record(format!("execute {}", command));

        let fails = self
            .remote
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .failing
            .iter()
            .any(|fragment| command.contains(fragment.as_str()));

        Ok(if fails {
            CommandOutput {
                stdout: String::new(),
                stderr: "simulated failure".to_string(),
                exit_code: 1,
            }
        } else {
            CommandOutput {
                stdout: "ok".to_string(),
                stderr: String::new(),
                exit_code: 0,
            }
        })
    }

    async fn disconnect(&mut self) {
        if self.connected {
            self.remote.journal.record("disconnect");
            self.connected = false;
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
