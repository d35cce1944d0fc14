//! HTTP routes

pub mod admin;
pub mod auth;
pub mod health;

use axum::{
    http::{header, HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{
    auth::{rate_limit_login, require_admin, require_auth},
    security::security_headers_middleware,
    state::AppState,
};

pub const DASHBOARD_PATH: &str = "/admin";

/// Extract client IP address from request headers.
/// Checks common proxy headers in order of preference.
pub fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("cf-connecting-ip") // Cloudflare
        .or_else(|| headers.get("x-real-ip"))
        .or_else(|| headers.get("x-forwarded-for"))
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// `302 Found` to `location`
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// `302 Found` that also sets a cookie
pub fn found_with_cookie(location: &str, cookie: String) -> Response {
    (
        StatusCode::FOUND,
        [
            (header::LOCATION, location.to_string()),
            (header::SET_COOKIE, cookie),
        ],
    )
        .into_response()
}

/// Create all routes
pub fn create_router(state: AppState) -> Router {
    // Health check routes (at root level for infrastructure monitoring)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    // Public routes (no session required)
    let public_routes = Router::new()
        .route(
            "/admin/login",
            get(auth::login_page).post(auth::login_submit),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_login,
        ))
        .route(
            "/register",
            get(auth::register_page).post(auth::register_submit),
        );

    // Admin-only routes
    let admin_routes = Router::new()
        .route("/admin/users", get(admin::users))
        .route("/admin/invites/new", get(admin::new_invite_page))
        .route("/admin/invites", post(admin::create_invite))
        .route("/admin/invites/:id/delete", post(admin::delete_invite))
        .route(
            "/admin/users/:id/sessions/delete",
            post(admin::revoke_user_sessions),
        )
        .route_layer(middleware::from_fn(require_admin));

    // Any signed-in user
    let protected_routes = Router::new()
        .route(DASHBOARD_PATH, get(admin::dashboard))
        .route("/admin/logout", get(auth::logout))
        .route(
            "/admin/password",
            get(admin::password_page).post(admin::password_submit),
        )
        .merge(admin_routes)
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(health_routes)
        .merge(public_routes)
        .merge(protected_routes)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
