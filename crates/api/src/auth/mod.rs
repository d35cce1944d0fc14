//! Authentication module for Folio

pub mod cookie;
mod error;
pub mod invites;
pub mod middleware;
pub mod password;
pub mod service;
pub mod sessions;
pub mod tokens;

pub use error::{AuthError, AuthResult};
pub use invites::{invite_link, normalize_email, InviteManager};
pub use middleware::{rate_limit_login, require_admin, require_auth, CurrentUser};
pub use password::{
    dummy_hash, hash_password, validate_password, verify_password, PasswordError,
    PasswordValidationError,
};
pub use service::AuthService;
pub use sessions::SessionManager;
pub use tokens::generate_token;
