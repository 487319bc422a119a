pub mod config;
pub mod error;
pub mod extract;
pub mod history;
pub mod kv;
pub mod model;
pub mod routes;

pub use routes::{build_router, AppState};
