//! End-to-end login, logout and invite registration through the router

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use axum::http::StatusCode;
use common::*;
use folio_api::auth::AuthError;
use folio_shared::{CredentialStore, Role};

#[tokio::test]
async fn test_login_success_redirects_with_session_cookie() {
    let app = TestApp::new();
    let admin = app.admin().await;

    let response = app
        .send(form_post(
            "/admin/login",
            &format!("email=ADMIN%40example.com&password={}", encode(ADMIN_PASSWORD)),
            None,
        ))
        .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), Some("/admin"));
    let cookie = set_cookie(&response).unwrap();
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Path=/"));

    let token = session_from(&response).unwrap();
    assert_eq!(token.len(), 64);
    let user = app.state.auth.get_user_by_session(&token).await.unwrap();
    assert_eq!(user.id, admin.id);
}

#[tokio::test]
async fn test_login_failure_rerenders_form_without_cookie() {
    let app = TestApp::new();
    app.admin().await;

    for body in [
        format!("email={}&password=wrong-password", encode(ADMIN_EMAIL)),
        "email=nobody%40example.com&password=whatever123".to_string(),
    ] {
        let response = app.send(form_post("/admin/login", &body, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(set_cookie(&response).is_none());
        let page = body_text(response).await;
        assert!(page.contains("Invalid email or password"));
    }
}

#[tokio::test]
async fn test_login_page_skips_form_for_signed_in_user() {
    let app = TestApp::new();
    app.admin().await;
    let token = app.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let response = app.send(get("/admin/login", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), Some("/admin"));

    let response = app.send(get("/admin/login", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_protected_page_without_session_redirects_to_login() {
    let app = TestApp::new();

    let response = app.send(get("/admin", None)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), Some("/admin/login"));

    let response = app.send(get("/admin", Some("not-a-real-token"))).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), Some("/admin/login"));
}

#[tokio::test]
async fn test_logout_invalidates_session() {
    let app = TestApp::new();
    app.admin().await;
    let token = app.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let response = app.send(get("/admin", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.send(get("/admin/logout", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), Some("/admin/login"));
    assert!(set_cookie(&response).unwrap().contains("Max-Age=-1"));
    assert!(matches!(
        app.state.auth.get_user_by_session(&token).await,
        Err(AuthError::InvalidSession)
    ));

    // The browser still holds the old cookie
    let response = app.send(get("/admin", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), Some("/admin/login"));
    assert!(set_cookie(&response).unwrap().contains("Max-Age=-1"));
}

#[tokio::test]
async fn test_login_rate_limit_blocks_sixth_attempt() {
    let app = TestApp::new();
    app.admin().await;

    let attempt = |password: &str| {
        let mut request = form_post(
            "/admin/login",
            &format!("email={}&password={}", encode(ADMIN_EMAIL), encode(password)),
            None,
        );
        request
            .headers_mut()
            .insert("x-real-ip", "203.0.113.50".parse().unwrap());
        request
    };

    for _ in 0..5 {
        let response = app.send(attempt("wrong-password")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    // Refused before the password is looked at
    let response = app.send(attempt(ADMIN_PASSWORD)).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));
    assert!(session_from(&response).is_none());
    assert_eq!(app.store.session_count().await, 0);

    // Other clients are unaffected
    let mut other = attempt(ADMIN_PASSWORD);
    other
        .headers_mut()
        .insert("x-real-ip", "198.51.100.9".parse().unwrap());
    let response = app.send(other).await;
    assert_eq!(response.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn test_login_page_views_are_not_rate_limited() {
    let app = TestApp::new();

    for _ in 0..10 {
        let response = app.send(get("/admin/login", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_invite_registration_flow() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let invite = app
        .state
        .auth
        .create_invite("a@x.com", admin.id, app.state.config.invite_duration())
        .await
        .unwrap();

    let response = app
        .send(get(&format!("/register?token={}", invite.token), None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains("a@x.com"));

    // A forged email field is ignored; the invite decides the address
    let response = app
        .send(form_post(
            "/register",
            &format!(
                "token={}&name=A&password=longenough1&email=evil%40example.com",
                invite.token
            ),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), Some("/admin"));
    let token = session_from(&response).unwrap();

    let user = app.store.user_by_email("a@x.com").await.unwrap().unwrap();
    assert_eq!(user.role, Role::User);
    assert_eq!(user.name, "A");
    assert!(app
        .store
        .user_by_email("evil@example.com")
        .await
        .unwrap()
        .is_none());

    assert!(matches!(
        app.state.auth.get_invite(&invite.token).await,
        Err(AuthError::InviteAlreadyUsed)
    ));

    let response = app.send(get("/admin", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::OK);

    // The new account can sign in with the chosen password
    app.login("a@x.com", "longenough1").await;
}

#[tokio::test]
async fn test_used_and_unknown_invites_are_refused() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let invite = app
        .state
        .auth
        .create_invite("b@x.com", admin.id, app.state.config.invite_duration())
        .await
        .unwrap();
    app.state.auth.use_invite(&invite.token).await.unwrap();

    let response = app
        .send(get(&format!("/register?token={}", invite.token), None))
        .await;
    assert_eq!(response.status(), StatusCode::GONE);

    let response = app
        .send(form_post(
            "/register",
            &format!("token={}&name=B&password=longenough1", invite.token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::GONE);
    assert!(app.store.user_by_email("b@x.com").await.unwrap().is_none());

    let unknown = "0".repeat(64);
    let response = app
        .send(get(&format!("/register?token={}", unknown), None))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.send(get("/register", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_expired_invite_is_refused() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let invite = app
        .state
        .auth
        .create_invite("c@x.com", admin.id, time::Duration::seconds(-1))
        .await
        .unwrap();

    let response = app
        .send(get(&format!("/register?token={}", invite.token), None))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_weak_password_keeps_invite_pending() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let invite = app
        .state
        .auth
        .create_invite("d@x.com", admin.id, app.state.config.invite_duration())
        .await
        .unwrap();

    let response = app
        .send(form_post(
            "/register",
            &format!("token={}&name=D&password=short", invite.token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_from(&response).is_none());
    let page = body_text(response).await;
    assert!(page.contains("d@x.com"));

    let pending = app.state.auth.get_invite(&invite.token).await.unwrap();
    assert!(pending.used_at.is_none());
    assert!(app.store.user_by_email("d@x.com").await.unwrap().is_none());
}

#[tokio::test]
async fn test_invite_for_registered_email_reports_conflict() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let invite = app
        .state
        .auth
        .create_invite(ADMIN_EMAIL, admin.id, app.state.config.invite_duration())
        .await
        .unwrap();

    let response = app
        .send(form_post(
            "/register",
            &format!("token={}&name=Dup&password=longenough1", invite.token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_from(&response).is_none());

    // Nothing was consumed
    assert!(app.state.auth.get_invite(&invite.token).await.is_ok());
}

#[tokio::test]
async fn test_responses_carry_security_headers() {
    let app = TestApp::new();

    let response = app.send(get("/admin/login", None)).await;
    let headers = response.headers();
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert!(headers.contains_key("content-security-policy"));
}
