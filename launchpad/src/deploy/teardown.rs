//! Deletion workflow: DNS record, instance, then the session itself

use tracing::{error, info};

use crate::deploy::workflow::Workflow;
use crate::models::event::Event;
use crate::models::session::{CompletionInfo, DeploymentSession, LogEntry};

/// Release the external resources of `session` and remove it after the
/// grace period. The session is removed even when the instance delete fails.
pub(crate) async fn run(workflow: Workflow, session: DeploymentSession) {
    let id = workflow.id.as_str();

    if let Some(hostname) = &session.hostname {
        workflow.report(format!("Removing DNS record {}...", hostname));
        if let Err(e) = workflow.dns.delete_record(hostname).await {
            workflow.warning(format!("Failed to delete DNS record {}: {}", hostname, e));
        }
    }

    let name = session.resource_name.clone().unwrap_or_default();
    workflow.report(format!("Deleting instance {}...", name));

    match workflow.provisioner.delete_instance(&name).await {
        Ok(()) => {
            info!(deployment_id = %id, instance = %name, "Deployment deleted");
            let hostname = session.hostname.clone().unwrap_or_default();
            workflow.bus.publish(
                id,
                Event::complete(CompletionInfo {
                    url: session.url().unwrap_or_default(),
                    resource_name: name,
                    address: session.address.clone().unwrap_or_default(),
                    hostname,
                }),
            );
        }
        Err(e) => {
            let message = format!("Failed to delete instance {}: {}", name, e);
            error!(deployment_id = %id, "{}", message);
            let _ = workflow.store.append_log(id, LogEntry::error(&message));
            workflow.bus.publish(id, Event::error(message));
        }
    }

    tokio::time::sleep(workflow.settings.removal_grace).await;
    workflow.store.delete(id);
    info!(deployment_id = %id, "Session removed after deletion");
}
