//! Credential store: row-level access to users, logins, sessions and invites
//!
//! The auth layer only talks to [`CredentialStore`]. [`PgCredentialStore`] is the
//! production backend; [`MemoryCredentialStore`] backs tests and database-less
//! local runs.

mod memory;
mod postgres;

pub use memory::MemoryCredentialStore;
pub use postgres::PgCredentialStore;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::error::StoreResult;
use crate::types::{
    Invite, InviteId, InvitedRegistration, Login, NewInvite, NewSession, NewUser, Session, User,
    UserId,
};

#[async_trait]
pub trait CredentialStore: Send + Sync {
    // Users

    async fn user_by_id(&self, id: UserId) -> StoreResult<Option<User>>;

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// All users, newest first
    async fn list_users(&self) -> StoreResult<Vec<User>>;

    /// Fails with `Conflict` when the email is taken
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;

    // Logins

    async fn password_login_by_email(&self, email: &str) -> StoreResult<Option<Login>>;

    async fn password_login_for_user(&self, user_id: UserId) -> StoreResult<Option<Login>>;

    /// Fails with `Conflict` when the email is already bound to a password login
    async fn insert_password_login(
        &self,
        user_id: UserId,
        email: &str,
        password_hash: &str,
    ) -> StoreResult<Login>;

    /// Returns the number of password logins updated
    async fn update_password_hash(&self, user_id: UserId, password_hash: &str) -> StoreResult<u64>;

    // Sessions

    async fn insert_session(&self, session: NewSession) -> StoreResult<Session>;

    /// Plain lookup, expired rows included
    async fn session_by_token(&self, token: &str) -> StoreResult<Option<Session>>;

    async fn delete_session(&self, token: &str) -> StoreResult<u64>;

    async fn delete_user_sessions(&self, user_id: UserId) -> StoreResult<u64>;

    async fn delete_expired_sessions(&self, now: OffsetDateTime) -> StoreResult<u64>;

    // Invites

    async fn insert_invite(&self, invite: NewInvite) -> StoreResult<Invite>;

    /// Plain lookup, used and expired rows included
    async fn invite_by_token(&self, token: &str) -> StoreResult<Option<Invite>>;

    /// Conditional update: sets `used_at = now` only for an unused,
    /// unexpired invite. Returns the affected row count (0 or 1).
    async fn mark_invite_used(&self, token: &str, now: OffsetDateTime) -> StoreResult<u64>;

    /// Unused, unexpired invites, newest first
    async fn pending_invites(&self, now: OffsetDateTime) -> StoreResult<Vec<Invite>>;

    async fn delete_invite(&self, id: InviteId) -> StoreResult<u64>;

    // Registration

    /// Consume the invite, create a `user`-role account with the invite's
    /// email and attach a password login, all-or-nothing.
    ///
    /// `InviteUnavailable` when the conditional update matches nothing,
    /// `Conflict` when the email already has an account.
    async fn register_invited_user(&self, registration: InvitedRegistration)
        -> StoreResult<User>;

    /// Connectivity probe for readiness checks
    async fn ping(&self) -> StoreResult<()>;
}
