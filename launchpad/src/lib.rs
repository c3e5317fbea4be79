//! Launchpad Library
//!
//! Core modules for provisioning, configuring and publishing deployments.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod events;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod models;
pub mod providers;
pub mod server;
pub mod session;
pub mod storage;
pub mod utils;
pub mod workers;
