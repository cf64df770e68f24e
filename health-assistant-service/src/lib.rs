pub mod auth;
pub mod config;
pub mod models;
pub mod service;

pub use auth::{InMemoryUserStore, PostgresUserStore, SessionRegistry, User, UserStore};
pub use config::{ConfigError, ServiceConfig};
pub use service::{AppState, build_router};
