//! Admin panel routes
//!
//! Everything here sits behind `require_auth`; user and invite management
//! additionally behind `require_admin`.

use axum::{
    extract::{Extension, Path, State},
    response::{Html, IntoResponse, Response},
    Form,
};
use folio_shared::{InviteId, UserId};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::{cookie::session_cookie, invite_link, AuthError, CurrentUser},
    error::{ApiError, ApiResult},
    pages,
    state::AppState,
};

use super::found;

const USERS_PATH: &str = "/admin/users";

#[derive(Debug, Deserialize)]
pub struct InviteForm {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordForm {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

pub async fn dashboard(Extension(current): Extension<CurrentUser>) -> Html<String> {
    pages::dashboard(&current)
}

// =============================================================================
// Password
// =============================================================================

pub async fn password_page(Extension(current): Extension<CurrentUser>) -> Html<String> {
    pages::change_password(&current, None, None)
}

/// Update the password, revoke every session of the user and sign this
/// browser back in with a fresh one.
pub async fn password_submit(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Form(form): Form<PasswordForm>,
) -> ApiResult<Response> {
    match state
        .auth
        .change_password(&current, &form.current_password, &form.new_password)
        .await
    {
        Ok(session) => {
            let cookie = session_cookie(
                &session.token,
                state.config.session_max_age_secs(),
                state.config.secure_cookies,
            );
            Ok((
                [(axum::http::header::SET_COOKIE, cookie)],
                pages::change_password(&current, None, Some("Password updated")),
            )
                .into_response())
        }
        Err(AuthError::InvalidCredentials) => Ok(pages::change_password(
            &current,
            Some("Current password is incorrect"),
            None,
        )
        .into_response()),
        Err(e @ (AuthError::WeakPassword(_) | AuthError::Validation(_))) => {
            Ok(pages::change_password(&current, Some(&e.to_string()), None).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

// =============================================================================
// Users & Invites (admin only)
// =============================================================================

pub async fn users(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Html<String>> {
    let users = state.store.list_users().await?;
    let invites = state.auth.get_pending_invites().await?;

    Ok(pages::users(&current, &users, &invites))
}

pub async fn new_invite_page(Extension(current): Extension<CurrentUser>) -> Html<String> {
    pages::new_invite(&current, None, "")
}

pub async fn create_invite(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Form(form): Form<InviteForm>,
) -> ApiResult<Response> {
    match state
        .auth
        .create_invite(&form.email, current.id, state.config.invite_duration())
        .await
    {
        Ok(invite) => {
            let link = invite_link(&state.config.public_url, &invite.token);
            Ok(pages::invite_created(&current, &invite, &link).into_response())
        }
        Err(AuthError::Validation(msg)) => {
            Ok(pages::new_invite(&current, Some(&msg), &form.email).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn delete_invite(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    if !state.auth.delete_invite(InviteId::from(id)).await? {
        return Err(ApiError::NotFound);
    }

    tracing::info!(invite_id = %id, admin_id = %current.id, "Invite deleted by admin");
    Ok(found(USERS_PATH))
}

pub async fn revoke_user_sessions(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let user_id = UserId::from(id);
    if state.store.user_by_id(user_id).await?.is_none() {
        return Err(ApiError::NotFound);
    }

    let revoked = state.auth.delete_user_sessions(user_id).await?;
    tracing::info!(
        user_id = %user_id,
        admin_id = %current.id,
        count = revoked,
        "Sessions revoked by admin"
    );

    Ok(found(USERS_PATH))
}
