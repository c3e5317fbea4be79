//! External collaborators: compute provisioning, remote execution and DNS

pub mod cloudflare;
pub mod digitalocean;
pub mod dns;
pub mod provisioner;
pub mod remote;
pub mod simulated;
pub mod ssh;
