//! In-process credential store
//!
//! Mirrors the Postgres schema constraints (unique emails, unique tokens,
//! unique `(provider, provider_id)`) so tests exercise the same failure paths.

use std::collections::HashMap;

use async_trait::async_trait;
use subtle::ConstantTimeEq;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::CredentialStore;
use crate::error::{StoreError, StoreResult};
use crate::types::{
    Invite, InviteId, InvitedRegistration, Login, NewInvite, NewSession, NewUser, Role, Session,
    User, UserId, PROVIDER_PASSWORD,
};

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    logins: Vec<Login>,
    sessions: Vec<Session>,
    invites: Vec<Invite>,
}

impl Tables {
    fn insert_user(&mut self, user: NewUser, now: OffsetDateTime) -> StoreResult<User> {
        if self.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("email already registered"));
        }

        let user = User {
            id: UserId::new(),
            email: user.email,
            name: user.name,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn insert_password_login(
        &mut self,
        user_id: UserId,
        email: &str,
        password_hash: &str,
        now: OffsetDateTime,
    ) -> StoreResult<Login> {
        if self
            .logins
            .iter()
            .any(|l| l.provider == PROVIDER_PASSWORD && l.provider_id == email)
        {
            return Err(StoreError::Conflict("email already bound to a login"));
        }

        let login = Login {
            id: Uuid::new_v4(),
            user_id,
            provider: PROVIDER_PASSWORD.to_string(),
            provider_id: email.to_string(),
            password_hash: Some(password_hash.to_string()),
            created_at: now,
            updated_at: now,
        };
        self.logins.push(login.clone());
        Ok(login)
    }

    fn pending_invite_mut(&mut self, token: &str, now: OffsetDateTime) -> Option<&mut Invite> {
        self.invites
            .iter_mut()
            .find(|i| tokens_match(&i.token, token))
            .filter(|i| !i.is_used() && !i.is_expired_at(now))
    }
}

fn tokens_match(stored: &str, candidate: &str) -> bool {
    stored.as_bytes().ct_eq(candidate.as_bytes()).into()
}

/// Credential store held entirely in memory
///
/// Used by the test suites and for running the server without a database.
#[derive(Default)]
pub struct MemoryCredentialStore {
    tables: Mutex<Tables>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions, expired ones included
    pub async fn session_count(&self) -> usize {
        self.tables.lock().await.sessions.len()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn user_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let tables = self.tables.lock().await;
        let mut users: Vec<User> = tables.users.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let now = OffsetDateTime::now_utc();
        self.tables.lock().await.insert_user(user, now)
    }

    async fn password_login_by_email(&self, email: &str) -> StoreResult<Option<Login>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .logins
            .iter()
            .find(|l| l.provider == PROVIDER_PASSWORD && l.provider_id == email)
            .cloned())
    }

    async fn password_login_for_user(&self, user_id: UserId) -> StoreResult<Option<Login>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .logins
            .iter()
            .find(|l| l.provider == PROVIDER_PASSWORD && l.user_id == user_id)
            .cloned())
    }

    async fn insert_password_login(
        &self,
        user_id: UserId,
        email: &str,
        password_hash: &str,
    ) -> StoreResult<Login> {
        let now = OffsetDateTime::now_utc();
        self.tables
            .lock()
            .await
            .insert_password_login(user_id, email, password_hash, now)
    }

    async fn update_password_hash(&self, user_id: UserId, password_hash: &str) -> StoreResult<u64> {
        let now = OffsetDateTime::now_utc();
        let mut tables = self.tables.lock().await;
        let mut updated = 0;
        for login in tables
            .logins
            .iter_mut()
            .filter(|l| l.provider == PROVIDER_PASSWORD && l.user_id == user_id)
        {
            login.password_hash = Some(password_hash.to_string());
            login.updated_at = now;
            updated += 1;
        }
        Ok(updated)
    }

    async fn insert_session(&self, session: NewSession) -> StoreResult<Session> {
        let mut tables = self.tables.lock().await;
        if tables.sessions.iter().any(|s| s.token == session.token) {
            return Err(StoreError::Conflict("session token collision"));
        }

        let session = Session {
            id: Uuid::new_v4(),
            user_id: session.user_id,
            token: session.token,
            expires_at: session.expires_at,
            created_at: OffsetDateTime::now_utc(),
        };
        tables.sessions.push(session.clone());
        Ok(session)
    }

    async fn session_by_token(&self, token: &str) -> StoreResult<Option<Session>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .sessions
            .iter()
            .find(|s| tokens_match(&s.token, token))
            .cloned())
    }

    async fn delete_session(&self, token: &str) -> StoreResult<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|s| !tokens_match(&s.token, token));
        Ok((before - tables.sessions.len()) as u64)
    }

    async fn delete_user_sessions(&self, user_id: UserId) -> StoreResult<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|s| s.user_id != user_id);
        Ok((before - tables.sessions.len()) as u64)
    }

    async fn delete_expired_sessions(&self, now: OffsetDateTime) -> StoreResult<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|s| !s.is_expired_at(now));
        Ok((before - tables.sessions.len()) as u64)
    }

    async fn insert_invite(&self, invite: NewInvite) -> StoreResult<Invite> {
        let mut tables = self.tables.lock().await;
        if tables.invites.iter().any(|i| i.token == invite.token) {
            return Err(StoreError::Conflict("invite token collision"));
        }

        let invite = Invite {
            id: InviteId::new(),
            email: invite.email,
            token: invite.token,
            invited_by: invite.invited_by,
            used_at: None,
            expires_at: invite.expires_at,
            created_at: OffsetDateTime::now_utc(),
        };
        tables.invites.push(invite.clone());
        Ok(invite)
    }

    async fn invite_by_token(&self, token: &str) -> StoreResult<Option<Invite>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .invites
            .iter()
            .find(|i| tokens_match(&i.token, token))
            .cloned())
    }

    async fn mark_invite_used(&self, token: &str, now: OffsetDateTime) -> StoreResult<u64> {
        let mut tables = self.tables.lock().await;
        match tables.pending_invite_mut(token, now) {
            Some(invite) => {
                invite.used_at = Some(now);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn pending_invites(&self, now: OffsetDateTime) -> StoreResult<Vec<Invite>> {
        let tables = self.tables.lock().await;
        let mut invites: Vec<Invite> = tables
            .invites
            .iter()
            .filter(|i| !i.is_used() && !i.is_expired_at(now))
            .cloned()
            .collect();
        invites.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invites)
    }

    async fn delete_invite(&self, id: InviteId) -> StoreResult<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.invites.len();
        tables.invites.retain(|i| i.id != id);
        Ok((before - tables.invites.len()) as u64)
    }

    async fn register_invited_user(
        &self,
        registration: InvitedRegistration,
    ) -> StoreResult<User> {
        let now = registration.now;
        // One lock for the whole unit stands in for the database transaction
        let mut tables = self.tables.lock().await;

        let email = tables
            .pending_invite_mut(&registration.token, now)
            .map(|invite| invite.email.clone())
            .ok_or(StoreError::InviteUnavailable)?;

        // Check every constraint before writing anything
        if tables.users.values().any(|u| u.email == email) {
            return Err(StoreError::Conflict("email already registered"));
        }
        if tables
            .logins
            .iter()
            .any(|l| l.provider == PROVIDER_PASSWORD && l.provider_id == email)
        {
            return Err(StoreError::Conflict("email already bound to a login"));
        }

        let user = tables.insert_user(
            NewUser {
                email: email.clone(),
                name: registration.name,
                role: Role::User,
            },
            now,
        )?;
        tables.insert_password_login(user.id, &email, &registration.password_hash, now)?;
        if let Some(invite) = tables.pending_invite_mut(&registration.token, now) {
            invite.used_at = Some(now);
        }

        Ok(user)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
