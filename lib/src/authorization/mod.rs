// lib/src/authorization/mod.rs

pub mod authorization_service;

pub use authorization_service::{AuthorizationService, RecordAccess};
