//! Request gates for the admin panel
//!
//! * [`require_auth`] resolves the session cookie into a [`CurrentUser`]
//!   request extension or redirects to the login page.
//! * [`require_admin`] runs after it and refuses non-admins with 403.
//! * [`rate_limit_login`] throttles password attempts per client address.

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use folio_shared::User;

use super::cookie::{clear_session_cookie, session_token};
use super::error::AuthError;
use crate::error::ApiError;
use crate::routes::extract_client_ip;
use crate::state::AppState;

pub const LOGIN_PATH: &str = "/admin/login";

/// The signed-in user, attached to the request by [`require_auth`]
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    /// Token of the session that authenticated this request
    pub session_token: String,
}

impl std::ops::Deref for CurrentUser {
    type Target = User;

    fn deref(&self) -> &User {
        &self.user
    }
}

/// Clear the cookie and send the browser to the login form
pub fn redirect_to_login(secure_cookies: bool) -> Response {
    (
        StatusCode::FOUND,
        [
            (header::LOCATION, LOGIN_PATH.to_string()),
            (header::SET_COOKIE, clear_session_cookie(secure_cookies)),
        ],
    )
        .into_response()
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = session_token(request.headers()) else {
        return redirect_to_login(state.config.secure_cookies);
    };

    match state.auth.get_user_by_session(&token).await {
        Ok(user) => {
            tracing::debug!(user_id = %user.id, path = %request.uri().path(), "Session resolved");
            request.extensions_mut().insert(CurrentUser {
                user,
                session_token: token,
            });
            next.run(request).await
        }
        Err(AuthError::InvalidSession) => redirect_to_login(state.config.secure_cookies),
        Err(e) => {
            tracing::error!(error = %e, "Session lookup failed");
            ApiError::from(e).into_response()
        }
    }
}

/// Admin capability gate; must be layered inside [`require_auth`]
pub async fn require_admin(request: Request<Body>, next: Next) -> Response {
    let allowed = request
        .extensions()
        .get::<CurrentUser>()
        .is_some_and(|current| current.is_admin());

    if !allowed {
        if let Some(current) = request.extensions().get::<CurrentUser>() {
            tracing::warn!(
                user_id = %current.id,
                path = %request.uri().path(),
                "Non-admin refused"
            );
        }
        return ApiError::Forbidden.into_response();
    }

    next.run(request).await
}

/// Throttle login submissions before any credential is checked
pub async fn rate_limit_login(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() != Method::POST {
        return next.run(request).await;
    }

    let key = client_key(&request);
    let result = state.login_limiter.check(&key).await;
    if !result.allowed {
        tracing::warn!(
            ip = %key,
            retry_after = ?result.retry_after_seconds,
            "login: Rate limit exceeded for IP"
        );
        return ApiError::RateLimited {
            retry_after_seconds: result.retry_after_seconds.unwrap_or(60),
        }
        .into_response();
    }

    next.run(request).await
}

/// Proxy headers first, then the socket peer
fn client_key(request: &Request<Body>) -> String {
    extract_client_ip(request.headers())
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}
