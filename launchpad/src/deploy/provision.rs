//! Provisioning workflow: instance, setup over SSH, DNS record

use tracing::info;

use crate::deploy::commands::setup_commands;
use crate::deploy::workflow::Workflow;
use crate::errors::LaunchError;
use crate::models::config::DeploymentConfig;
use crate::models::event::Event;
use crate::models::session::CompletionInfo;
use crate::providers::provisioner::InstanceSpec;
use crate::session::fsm::SessionEvent;

/// External resources created so far, released again on failure
#[derive(Debug, Default)]
struct Created {
    instance: Option<String>,
    record: Option<String>,
}

/// Run the provisioning workflow to completion. Errors end up in the
/// session and on the bus, never with the caller.
pub(crate) async fn run(workflow: Workflow, config: DeploymentConfig) {
    let mut created = Created::default();

    match provision(&workflow, &config, &mut created).await {
        Ok(completion) => {
            info!(
                deployment_id = %workflow.id,
                resource_name = %completion.resource_name,
                url = %completion.url,
                "Deployment provisioned"
            );
            workflow.bus.publish(&workflow.id, Event::complete(completion));
        }
        Err(e) => {
            workflow.fail(&e);
            compensate(&workflow, &created).await;
        }
    }
}

fn instance_spec(workflow: &Workflow, config: &DeploymentConfig) -> InstanceSpec {
    InstanceSpec {
        region: config.region.clone(),
        size: config.size.clone(),
        image: config.image.clone(),
        tags: vec![
            "launchpad".to_string(),
            format!("deployment:{}", workflow.id),
        ],
    }
}

async fn provision(
    workflow: &Workflow,
    config: &DeploymentConfig,
    created: &mut Created,
) -> Result<CompletionInfo, LaunchError> {
    let id = workflow.id.as_str();
    let settings = &workflow.settings;
    let name = config.resource_name();

    // instance
    workflow.progress(format!("Creating instance {}...", name))?;
    workflow
        .provisioner
        .create_instance(&name, &instance_spec(workflow, config))
        .await?;
    created.instance = Some(name.clone());
    workflow.store.set_resource_name(id, &name)?;

    workflow.progress("Waiting for instance to become ready...")?;
    let address = workflow
        .provisioner
        .wait_until_ready(&name, settings.ready_max_attempts, settings.ready_poll_interval)
        .await?;
    workflow.store.set_address(id, &address)?;
    workflow.progress(format!("Instance {} is running at {}", name, address))?;

    workflow.progress("Opening network access...")?;
    workflow.provisioner.open_all_network_access(&name).await?;

    workflow.progress(format!(
        "Waiting {}s for the instance to settle...",
        settings.settle_delay.as_secs()
    ))?;
    tokio::time::sleep(settings.settle_delay).await;

    // setup
    workflow.progress(format!("Connecting to {}...", address))?;
    let mut executor = workflow.remote.executor();
    let setup = async {
        executor
            .connect(&address, &config.credentials.ssh_private_key)
            .await?;
        workflow.progress("Connected, running setup commands")?;
        workflow
            .run_commands(executor.as_mut(), &setup_commands(config))
            .await
    }
    .await;
    executor.disconnect().await;
    setup?;
    workflow.progress("Setup finished, connection closed")?;

    // dns
    let requested = config.requested_hostname();
    workflow.progress(format!("Registering {} -> {}...", requested, address))?;
    let hostname = workflow.dns.create_record(&requested, &address).await?;
    created.record = Some(hostname.clone());
    workflow.store.set_hostname(id, &hostname)?;

    workflow.store.transition(id, SessionEvent::Provisioned)?;

    Ok(CompletionInfo {
        url: format!("https://{}", hostname),
        resource_name: name,
        address,
        hostname,
    })
}

/// Best-effort release of whatever the failed run created
async fn compensate(workflow: &Workflow, created: &Created) {
    if let Some(hostname) = &created.record {
        match workflow.dns.delete_record(hostname).await {
            Ok(()) => info!(deployment_id = %workflow.id, %hostname, "Rolled back DNS record"),
            Err(e) => workflow.warning(format!(
                "Cleanup: failed to delete DNS record {}: {}",
                hostname, e
            )),
        }
    }

    if let Some(name) = &created.instance {
        match workflow.provisioner.delete_instance(name).await {
            Ok(()) => info!(deployment_id = %workflow.id, instance = %name, "Rolled back instance"),
            Err(e) => workflow.warning(format!(
                "Cleanup: failed to delete instance {}: {}",
                name, e
            )),
        }
    }
}
