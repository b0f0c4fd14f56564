// lib/src/pinning/mod.rs

pub mod content_pinner;
pub mod pinata_client;

pub use content_pinner::{build_gateway_url, ContentPinner, DisabledPinner, PinReceipt};
pub use pinata_client::PinataClient;
