//! Authentication facade used by the HTTP layer
//!
//! Bundles the session and invite managers with credential checks and the
//! invite-based registration flow.

use std::sync::Arc;

use folio_shared::{
    CredentialStore, Invite, InviteId, InvitedRegistration, Login, Session, StoreError, User,
    UserId,
};
use time::{Duration, OffsetDateTime};

use super::error::{AuthError, AuthResult};
use super::invites::{normalize_email, InviteManager};
use super::password::{dummy_hash, hash_password, validate_password, verify_password};
use super::sessions::SessionManager;

const MAX_NAME_LEN: usize = 255;

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    sessions: SessionManager,
    invites: InviteManager,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        session_duration: Duration,
        invite_duration: Duration,
    ) -> Self {
        Self {
            sessions: SessionManager::new(store.clone(), session_duration),
            invites: InviteManager::new(store.clone(), invite_duration),
            store,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn invites(&self) -> &InviteManager {
        &self.invites
    }

    // =========================================================================
    // Credentials
    // =========================================================================

    /// Check an email/password pair
    ///
    /// Unknown email and wrong password both yield `InvalidCredentials`, and
    /// both run one Argon2 verification.
    pub async fn authenticate(&self, email: &str, password: &str) -> AuthResult<User> {
        let email = email.trim().to_lowercase();

        let login = self.store.password_login_by_email(&email).await?;
        let Some((user_id, hash)) = login
            .as_ref()
            .and_then(|l| l.password_hash.as_deref().map(|h| (l.user_id, h)))
        else {
            // Same cost as a real check
            if let Some(dummy) = dummy_hash() {
                let _ = verify_password(password, dummy);
            }
            tracing::debug!("Login attempt without a password login");
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        match self.store.user_by_id(user_id).await? {
            Some(user) => {
                tracing::info!(user_id = %user.id, "User authenticated");
                Ok(user)
            }
            None => {
                tracing::warn!(user_id = %user_id, "Password login without a user record");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Attach a password login to an existing user. One per user.
    pub async fn create_password_login(
        &self,
        user_id: UserId,
        email: &str,
        password: &str,
    ) -> AuthResult<Login> {
        validate_password(password)?;
        let email = normalize_email(email)?;

        if self.store.password_login_for_user(user_id).await?.is_some() {
            return Err(AuthError::LoginAlreadyExists);
        }

        let hash = hash_password(password)?;
        let login = self
            .store
            .insert_password_login(user_id, &email, &hash)
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => AuthError::LoginAlreadyExists,
                other => AuthError::Store(other),
            })?;

        tracing::info!(user_id = %user_id, "Password login created");
        Ok(login)
    }

    /// Replace the password hash. Existing sessions are left alone.
    pub async fn update_password(&self, user_id: UserId, new_password: &str) -> AuthResult<()> {
        validate_password(new_password)?;
        let hash = hash_password(new_password)?;

        let updated = self.store.update_password_hash(user_id, &hash).await?;
        if updated == 0 {
            return Err(AuthError::InvalidCredentials);
        }

        tracing::info!(user_id = %user_id, "Password updated");
        Ok(())
    }

    /// Verify the current password, set the new one, revoke every session
    /// of the user and issue a fresh one.
    pub async fn change_password(
        &self,
        user: &User,
        current_password: &str,
        new_password: &str,
    ) -> AuthResult<Session> {
        let login = self
            .store
            .password_login_for_user(user.id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        let hash = login
            .password_hash
            .as_deref()
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(current_password, hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        self.update_password(user.id, new_password).await?;
        self.sessions.delete_all_for_user(user.id).await?;
        self.sessions.create(user.id).await
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    pub async fn create_session(&self, user_id: UserId, duration: Duration) -> AuthResult<Session> {
        self.sessions.create_with_duration(user_id, duration).await
    }

    pub async fn get_user_by_session(&self, token: &str) -> AuthResult<User> {
        self.sessions.user_by_token(token).await
    }

    pub async fn delete_session(&self, token: &str) -> AuthResult<()> {
        self.sessions.delete(token).await
    }

    pub async fn delete_user_sessions(&self, user_id: UserId) -> AuthResult<u64> {
        self.sessions.delete_all_for_user(user_id).await
    }

    /// Authenticate and open a session in one step
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<(User, Session)> {
        let user = self.authenticate(email, password).await?;
        let session = self.sessions.create(user.id).await?;
        Ok((user, session))
    }

    // =========================================================================
    // Invites
    // =========================================================================

    pub async fn create_invite(
        &self,
        email: &str,
        invited_by: UserId,
        duration: Duration,
    ) -> AuthResult<Invite> {
        self.invites
            .create_with_duration(email, invited_by, duration)
            .await
    }

    pub async fn get_invite(&self, token: &str) -> AuthResult<Invite> {
        self.invites.get(token).await
    }

    pub async fn use_invite(&self, token: &str) -> AuthResult<()> {
        self.invites.mark_used(token).await
    }

    pub async fn get_pending_invites(&self) -> AuthResult<Vec<Invite>> {
        self.invites.pending().await
    }

    pub async fn delete_invite(&self, id: InviteId) -> AuthResult<bool> {
        self.invites.delete(id).await
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Redeem an invite: create a `user`-role account with the invite's email
    /// and the chosen password, then sign it in.
    ///
    /// Consuming the invite and creating the account happen atomically. If the
    /// email already has an account nothing is written and the invite stays
    /// pending.
    pub async fn register_with_invite(
        &self,
        token: &str,
        name: &str,
        password: &str,
    ) -> AuthResult<(User, Session)> {
        let invite = self.invites.get(token).await?;

        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::Validation("Name is required".into()));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(AuthError::Validation("Name is too long".into()));
        }
        validate_password(password)?;

        let password_hash = hash_password(password)?;
        let user = self
            .store
            .register_invited_user(InvitedRegistration {
                token: invite.token,
                name: name.to_string(),
                password_hash,
                now: OffsetDateTime::now_utc(),
            })
            .await
            .map_err(|e| match e {
                StoreError::InviteUnavailable => AuthError::InvalidInvite,
                StoreError::Conflict(_) => AuthError::EmailTaken,
                other => AuthError::Store(other),
            })?;

        tracing::info!(
            user_id = %user.id,
            invite_id = %invite.id,
            invited_by = %invite.invited_by,
            "User registered from invite"
        );

        let session = self.sessions.create(user.id).await?;
        Ok((user, session))
    }
}
