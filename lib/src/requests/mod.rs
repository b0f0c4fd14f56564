// lib/src/requests/mod.rs

pub mod request_service;
pub mod request_types;

pub use request_service::RequestService;
pub use request_types::{CreateRequest, CreateRequestBody};
