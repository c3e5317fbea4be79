//! Session state and storage

pub mod fsm;
pub mod store;
