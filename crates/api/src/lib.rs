//! Folio API Library
//!
//! Session-based admin panel with invite-only registration.

pub mod auth;
pub mod config;
pub mod error;
pub mod maintenance;
pub mod pages;
pub mod routes;
pub mod security;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
