// server/src/lib.rs
// HTTP surface and command line of the medledger coordinator.

pub mod api;
pub mod cli;
