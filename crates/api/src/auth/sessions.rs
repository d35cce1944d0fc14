//! Server-side browser sessions
//!
//! A session is an opaque 64-hex-character token bound to one user with an
//! absolute expiry. Sessions are never renewed. Expired rows are deleted when
//! they are read and by the periodic purge.

use std::sync::Arc;

use folio_shared::{CredentialStore, NewSession, Session, User, UserId};
use time::{Duration, OffsetDateTime};

use super::error::{AuthError, AuthResult};
use super::tokens::{generate_token, is_well_formed};

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    default_duration: Duration,
}

impl SessionManager {
    pub fn new(store: Arc<dyn CredentialStore>, default_duration: Duration) -> Self {
        Self {
            store,
            default_duration,
        }
    }

    /// Issue a session with the configured lifetime
    pub async fn create(&self, user_id: UserId) -> AuthResult<Session> {
        self.create_with_duration(user_id, self.default_duration)
            .await
    }

    pub async fn create_with_duration(
        &self,
        user_id: UserId,
        duration: Duration,
    ) -> AuthResult<Session> {
        let expires_at = OffsetDateTime::now_utc()
            .checked_add(duration)
            .ok_or_else(|| AuthError::Validation("Session lifetime is out of range".into()))?;

        let session = self
            .store
            .insert_session(NewSession {
                user_id,
                token: generate_token(),
                expires_at,
            })
            .await?;

        tracing::debug!(user_id = %user_id, expires_at = %session.expires_at, "Session created");

        Ok(session)
    }

    /// Resolve a token to a live session
    ///
    /// An expired session is deleted before `InvalidSession` is returned.
    pub async fn get(&self, token: &str) -> AuthResult<Session> {
        if !is_well_formed(token) {
            return Err(AuthError::InvalidSession);
        }

        let session = self
            .store
            .session_by_token(token)
            .await?
            .ok_or(AuthError::InvalidSession)?;

        if session.is_expired_at(OffsetDateTime::now_utc()) {
            self.store.delete_session(token).await?;
            tracing::debug!(user_id = %session.user_id, "Expired session removed on access");
            return Err(AuthError::InvalidSession);
        }

        Ok(session)
    }

    pub async fn user_by_token(&self, token: &str) -> AuthResult<User> {
        let session = self.get(token).await?;

        self.store
            .user_by_id(session.user_id)
            .await?
            .ok_or(AuthError::InvalidSession)
    }

    /// Idempotent: unknown tokens are not an error
    pub async fn delete(&self, token: &str) -> AuthResult<()> {
        if !is_well_formed(token) {
            return Ok(());
        }
        self.store.delete_session(token).await?;
        Ok(())
    }

    pub async fn delete_all_for_user(&self, user_id: UserId) -> AuthResult<u64> {
        let deleted = self.store.delete_user_sessions(user_id).await?;
        tracing::info!(user_id = %user_id, count = deleted, "User sessions revoked");
        Ok(deleted)
    }

    pub async fn purge_expired(&self) -> AuthResult<u64> {
        let deleted = self
            .store
            .delete_expired_sessions(OffsetDateTime::now_utc())
            .await?;

        if deleted > 0 {
            tracing::info!(count = deleted, "Cleaned up expired sessions");
        }

        Ok(deleted)
    }
}
