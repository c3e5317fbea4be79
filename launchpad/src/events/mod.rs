//! Event distribution

pub mod bus;
