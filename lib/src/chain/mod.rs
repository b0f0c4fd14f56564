// lib/src/chain/mod.rs

pub mod abi;
pub mod chain_client;

pub use chain_client::{ChainAuthority, ChainRead, DisabledChainAuthority, RegistryClient};
