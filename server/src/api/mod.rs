// server/src/api/mod.rs

pub mod app_state;
pub mod errors;
pub mod handlers;
pub mod routes;

pub use app_state::AppState;
pub use routes::routes;
