//! HTTP client for provider APIs

pub mod client;
