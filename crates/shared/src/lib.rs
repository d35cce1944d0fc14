//! Folio shared types and storage
//!
//! Domain types, the credential store abstraction with its Postgres and
//! in-memory backends, database helpers and the login rate limiter.

pub mod db;
pub mod error;
pub mod rate_limit;
pub mod store;
pub mod types;

pub use db::*;
pub use error::*;
pub use rate_limit::{RateLimitResult, RateLimiter};
pub use store::{CredentialStore, MemoryCredentialStore, PgCredentialStore};
pub use types::*;
