//! Shared application state

use std::sync::Arc;

use folio_shared::{CredentialStore, RateLimiter};

use crate::auth::AuthService;
use crate::config::Config;

/// State handed to every handler and middleware
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn CredentialStore>,
    pub auth: AuthService,
    /// Throttles `POST /admin/login` per client address
    pub login_limiter: RateLimiter,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn CredentialStore>) -> Self {
        let auth = AuthService::new(
            store.clone(),
            config.session_duration(),
            config.invite_duration(),
        );
        let login_limiter = RateLimiter::per_minute(config.login_rate_limit_per_minute);

        Self {
            config: Arc::new(config),
            store,
            auth,
            login_limiter,
        }
    }
}
