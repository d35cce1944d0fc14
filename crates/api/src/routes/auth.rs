//! Login, logout and invite registration

use axum::{
    extract::{Extension, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Form,
};
use serde::Deserialize;

use crate::{
    auth::{
        cookie::{clear_session_cookie, session_cookie, session_token},
        middleware::LOGIN_PATH,
        AuthError, CurrentUser,
    },
    error::{ApiError, ApiResult},
    pages,
    state::AppState,
};

use super::{found, found_with_cookie, DASHBOARD_PATH};

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterQuery {
    pub token: Option<String>,
}

/// Any `email` field in the submission is ignored; the invite decides it
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub password: String,
}

// =============================================================================
// Login / Logout
// =============================================================================

/// Login form; signed-in users go straight to the dashboard
pub async fn login_page(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers) {
        if state.auth.get_user_by_session(&token).await.is_ok() {
            return found(DASHBOARD_PATH);
        }
    }

    pages::login(None, "").into_response()
}

pub async fn login_submit(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> ApiResult<Response> {
    match state.auth.login(&form.email, &form.password).await {
        Ok((user, session)) => {
            tracing::info!(user_id = %user.id, "login: Session issued");
            Ok(found_with_cookie(
                DASHBOARD_PATH,
                session_cookie(
                    &session.token,
                    state.config.session_max_age_secs(),
                    state.config.secure_cookies,
                ),
            ))
        }
        Err(AuthError::InvalidCredentials) => {
            tracing::warn!("login: Invalid credentials");
            Ok(pages::login(Some(pages::INVALID_LOGIN), &form.email).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Response> {
    state.auth.delete_session(&current.session_token).await?;
    tracing::info!(user_id = %current.id, "logout: Session deleted");

    Ok(found_with_cookie(
        LOGIN_PATH,
        clear_session_cookie(state.config.secure_cookies),
    ))
}

// =============================================================================
// Registration
// =============================================================================

fn invite_error_page(err: &AuthError) -> Response {
    let status = match err {
        AuthError::InviteAlreadyUsed => StatusCode::GONE,
        _ => StatusCode::NOT_FOUND,
    };
    (status, pages::invite_unavailable(&err.to_string())).into_response()
}

pub async fn register_page(
    State(state): State<AppState>,
    Query(query): Query<RegisterQuery>,
) -> ApiResult<Response> {
    let token = query.token.unwrap_or_default();

    match state.auth.get_invite(&token).await {
        Ok(invite) => Ok(pages::register(&invite, None, "").into_response()),
        Err(e @ (AuthError::InvalidInvite | AuthError::InviteAlreadyUsed)) => {
            Ok(invite_error_page(&e))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn register_submit(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> ApiResult<Response> {
    let err = match state
        .auth
        .register_with_invite(&form.token, &form.name, &form.password)
        .await
    {
        Ok((_user, session)) => {
            return Ok(found_with_cookie(
                DASHBOARD_PATH,
                session_cookie(
                    &session.token,
                    state.config.session_max_age_secs(),
                    state.config.secure_cookies,
                ),
            ));
        }
        Err(e) => e,
    };

    match err {
        AuthError::InvalidInvite | AuthError::InviteAlreadyUsed => Ok(invite_error_page(&err)),
        AuthError::WeakPassword(_) | AuthError::Validation(_) | AuthError::EmailTaken => {
            // Invite is still pending; show the form again
            let invite = match state.auth.get_invite(&form.token).await {
                Ok(invite) => invite,
                Err(e @ (AuthError::InvalidInvite | AuthError::InviteAlreadyUsed)) => {
                    return Ok(invite_error_page(&e));
                }
                Err(e) => return Err(e.into()),
            };
            Ok(pages::register(&invite, Some(&err.to_string()), &form.name).into_response())
        }
        other => Err(ApiError::from(other)),
    }
}
