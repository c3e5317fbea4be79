//! Integration tests

mod support;

mod test_bus;
mod test_fsm;
mod test_orchestrator;
mod test_server;
mod test_store;
