/// Helpdesk account service
///
/// User registration, password login with signed access/refresh tokens,
/// and profile lookup over HTTP, backed by SQLite.
pub mod account;
pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod server;
pub mod validation;

pub use config::ServerConfig;
pub use context::AppContext;
pub use error::{HelpdeskError, HelpdeskResult};
