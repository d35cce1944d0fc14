//! Shared harness for router-level tests
//!
//! Builds the full router over an in-memory store so requests go through
//! the same middleware stack as production.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use folio_api::{create_router, AppState, Config};
use folio_shared::{CredentialStore, MemoryCredentialStore, NewUser, Role, User};
use tower::ServiceExt;
use url::Url;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "correct horse battery";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryCredentialStore>,
}

pub fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".into(),
        public_url: Url::parse("https://folio.example.com").unwrap(),
        environment: "test".into(),
        database_url: "postgres://unused".into(),
        database_max_connections: 1,
        secure_cookies: false,
        session_duration_hours: 24,
        invite_duration_days: 7,
        login_rate_limit_per_minute: 5,
        maintenance_interval_secs: 300,
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryCredentialStore::new());
        let state = AppState::new(config, store.clone());
        let router = create_router(state.clone());
        Self {
            router,
            state,
            store,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Create a user with a password login
    pub async fn user_with_password(&self, email: &str, role: Role, password: &str) -> User {
        let user = self
            .store
            .insert_user(NewUser {
                email: email.into(),
                name: "Test User".into(),
                role,
            })
            .await
            .unwrap();
        self.state
            .auth
            .create_password_login(user.id, email, password)
            .await
            .unwrap();
        user
    }

    pub async fn admin(&self) -> User {
        self.user_with_password(ADMIN_EMAIL, Role::Admin, ADMIN_PASSWORD)
            .await
    }

    /// Log in through the form and return the session token from the cookie
    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .send(form_post(
                "/admin/login",
                &format!("email={}&password={}", encode(email), encode(password)),
                None,
            ))
            .await;
        assert_eq!(response.status(), 302, "login for {} failed", email);
        session_from(&response).expect("login response sets a session cookie")
    }
}

/// Minimal form encoding for the characters tests use
pub fn encode(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('&', "%26")
        .replace('+', "%2B")
        .replace('@', "%40")
        .replace(' ', "+")
}

pub fn get(uri: &str, session: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = session {
        builder = builder.header(header::COOKIE, format!("folio_session={}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn form_post(uri: &str, body: &str, session: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(token) = session {
        builder = builder.header(header::COOKIE, format!("folio_session={}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn set_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Token from a `Set-Cookie: folio_session=...` header, if one was issued
pub fn session_from(response: &Response<Body>) -> Option<String> {
    let cookie = set_cookie(response)?;
    let value = cookie.strip_prefix("folio_session=")?.split(';').next()?;
    (!value.is_empty()).then(|| value.to_string())
}

pub fn location(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
