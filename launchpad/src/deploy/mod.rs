//! Deployment workflows

pub mod commands;
pub mod lease;
pub mod naming;
pub mod orchestrator;
pub mod workflow;

mod provision;
mod redeploy;
mod teardown;
