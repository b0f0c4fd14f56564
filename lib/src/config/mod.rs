// lib/src/config/mod.rs
pub mod config_constants;
pub mod config_structs;
pub mod config_helpers;

pub use config_constants::*;
pub use config_structs::*;
pub use config_helpers::*;
