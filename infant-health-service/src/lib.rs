pub mod assessments;
pub mod config;
pub mod error;
pub mod media;
pub mod models;
pub mod providers;
pub mod service;

pub use config::ServiceConfig;
pub use service::{AppState, build_router};
