//! Registration invites
//!
//! An invite is a single-use grant that lets one email address register.
//! Consumption goes through the store's conditional update, so two racing
//! registrations can never both succeed.

use std::sync::Arc;

use folio_shared::{CredentialStore, Invite, InviteId, NewInvite, UserId};
use time::{Duration, OffsetDateTime};
use url::Url;

use super::error::{AuthError, AuthResult};
use super::tokens::{generate_token, is_well_formed};

const MAX_EMAIL_LEN: usize = 254;

#[derive(Clone)]
pub struct InviteManager {
    store: Arc<dyn CredentialStore>,
    default_duration: Duration,
}

impl InviteManager {
    pub fn new(store: Arc<dyn CredentialStore>, default_duration: Duration) -> Self {
        Self {
            store,
            default_duration,
        }
    }

    pub async fn create(&self, email: &str, invited_by: UserId) -> AuthResult<Invite> {
        self.create_with_duration(email, invited_by, self.default_duration)
            .await
    }

    pub async fn create_with_duration(
        &self,
        email: &str,
        invited_by: UserId,
        duration: Duration,
    ) -> AuthResult<Invite> {
        let email = normalize_email(email)?;
        let expires_at = OffsetDateTime::now_utc()
            .checked_add(duration)
            .ok_or_else(|| AuthError::Validation("Invite lifetime is out of range".into()))?;

        let invite = self
            .store
            .insert_invite(NewInvite {
                email,
                token: generate_token(),
                invited_by,
                expires_at,
            })
            .await?;

        tracing::info!(
            invite_id = %invite.id,
            invited_by = %invited_by,
            expires_at = %invite.expires_at,
            "Invite created"
        );

        Ok(invite)
    }

    /// Look up an invite that can still be redeemed
    ///
    /// Unknown and expired tokens both yield `InvalidInvite`.
    pub async fn get(&self, token: &str) -> AuthResult<Invite> {
        if !is_well_formed(token) {
            return Err(AuthError::InvalidInvite);
        }

        let invite = self
            .store
            .invite_by_token(token)
            .await?
            .ok_or(AuthError::InvalidInvite)?;

        if invite.is_expired_at(OffsetDateTime::now_utc()) {
            return Err(AuthError::InvalidInvite);
        }

        if invite.is_used() {
            tracing::warn!(invite_id = %invite.id, "Attempted to reuse invite");
            return Err(AuthError::InviteAlreadyUsed);
        }

        Ok(invite)
    }

    /// Mark the invite consumed. Exactly one concurrent caller succeeds.
    pub async fn mark_used(&self, token: &str) -> AuthResult<()> {
        if !is_well_formed(token) {
            return Err(AuthError::InvalidInvite);
        }

        let updated = self
            .store
            .mark_invite_used(token, OffsetDateTime::now_utc())
            .await?;

        if updated == 0 {
            return Err(AuthError::InvalidInvite);
        }

        Ok(())
    }

    /// Unused, unexpired invites, newest first
    pub async fn pending(&self) -> AuthResult<Vec<Invite>> {
        Ok(self
            .store
            .pending_invites(OffsetDateTime::now_utc())
            .await?)
    }

    /// Returns whether an invite was removed
    pub async fn delete(&self, id: InviteId) -> AuthResult<bool> {
        let deleted = self.store.delete_invite(id).await?;
        if deleted > 0 {
            tracing::info!(invite_id = %id, "Invite revoked");
        }
        Ok(deleted > 0)
    }
}

/// Trim and lowercase an email address, rejecting anything without a
/// plausible `local@domain` shape.
pub fn normalize_email(email: &str) -> AuthResult<String> {
    let email = email.trim().to_lowercase();

    if email.is_empty() {
        return Err(AuthError::Validation("Email is required".into()));
    }

    if email.len() > MAX_EMAIL_LEN {
        return Err(AuthError::Validation("Email is too long".into()));
    }

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        return Err(AuthError::Validation("Invalid email address".into()));
    }

    Ok(email)
}

/// `<base>/register?token=<token>`
pub fn invite_link(base_url: &Url, token: &str) -> String {
    let mut url = base_url.clone();
    let path = format!("{}/register", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.set_fragment(None);
    url.query_pairs_mut().clear().append_pair("token", token);
    url.into()
}
