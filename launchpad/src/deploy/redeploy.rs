//! Redeploy workflow: pull and restart on an existing instance

use tracing::info;

use crate::deploy::commands::redeploy_commands;
use crate::deploy::workflow::Workflow;
use crate::errors::LaunchError;
use crate::models::config::DeploymentConfig;
use crate::models::event::Event;
use crate::models::session::{CompletionInfo, DeploymentSession};
use crate::session::fsm::SessionEvent;

/// Run the redeploy workflow for a session already moved to `redeploying`
pub(crate) async fn run(workflow: Workflow, session: DeploymentSession) {
    match redeploy(&workflow, &session).await {
        Ok(completion) => {
            info!(
                deployment_id = %workflow.id,
                url = %completion.url,
                "Deployment redeployed"
            );
            workflow.bus.publish(&workflow.id, Event::complete(completion));
        }
        // the instance predates this run, nothing to roll back
        Err(e) => workflow.fail(&e),
    }
}

async fn redeploy(
    workflow: &Workflow,
    session: &DeploymentSession,
) -> Result<CompletionInfo, LaunchError> {
    let id = workflow.id.as_str();
    let config: &DeploymentConfig = &session.config;

    let (Some(name), Some(address), Some(hostname)) = (
        session.resource_name.clone(),
        session.address.clone(),
        session.hostname.clone(),
    ) else {
        return Err(LaunchError::InvalidState(
            "deployment has no instance to redeploy".to_string(),
        ));
    };

    workflow.progress(format!("Connecting to {}...", address))?;
    let mut executor = workflow.remote.executor();
    let update = async {
        executor
            .connect(&address, &config.credentials.ssh_private_key)
            .await?;
        workflow.progress("Connected, updating application")?;
        workflow
            .run_commands(executor.as_mut(), &redeploy_commands(config))
            .await
    }
    .await;
    executor.disconnect().await;
    update?;
    workflow.progress("Update finished, connection closed")?;

    workflow.store.transition(id, SessionEvent::Redeployed)?;

    Ok(CompletionInfo {
        url: format!("https://{}", hostname),
        resource_name: name,
        address,
        hostname,
    })
}
