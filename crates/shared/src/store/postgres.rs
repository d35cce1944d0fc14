//! PostgreSQL credential store

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::CredentialStore;
use crate::error::{StoreError, StoreResult};
use crate::types::{
    Invite, InviteId, InvitedRegistration, Login, NewInvite, NewSession, NewUser, Role, Session,
    User, UserId, PROVIDER_PASSWORD,
};

const USER_COLUMNS: &str = "id, email, name, role, created_at, updated_at";
const LOGIN_COLUMNS: &str =
    "id, user_id, provider, provider_id, password_hash, created_at, updated_at";
const SESSION_COLUMNS: &str = "id, user_id, token, expires_at, created_at";
const INVITE_COLUMNS: &str = "id, email, token, invited_by, used_at, expires_at, created_at";

/// Credential store backed by a sqlx connection pool
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn user_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, email, name, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(UserId::new())
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::unique_violation(e, "email already registered"))
    }

    async fn password_login_by_email(&self, email: &str) -> StoreResult<Option<Login>> {
        let login = sqlx::query_as::<_, Login>(&format!(
            "SELECT {LOGIN_COLUMNS} FROM logins WHERE provider = $1 AND provider_id = $2"
        ))
        .bind(PROVIDER_PASSWORD)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(login)
    }

    async fn password_login_for_user(&self, user_id: UserId) -> StoreResult<Option<Login>> {
        let login = sqlx::query_as::<_, Login>(&format!(
            r#"
            SELECT {LOGIN_COLUMNS} FROM logins
            WHERE user_id = $1 AND provider = $2
            ORDER BY created_at
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .bind(PROVIDER_PASSWORD)
        .fetch_optional(&self.pool)
        .await?;

        Ok(login)
    }

    async fn insert_password_login(
        &self,
        user_id: UserId,
        email: &str,
        password_hash: &str,
    ) -> StoreResult<Login> {
        sqlx::query_as::<_, Login>(&format!(
            r#"
            INSERT INTO logins (id, user_id, provider, provider_id, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {LOGIN_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(PROVIDER_PASSWORD)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::unique_violation(e, "email already bound to a login"))
    }

    async fn update_password_hash(&self, user_id: UserId, password_hash: &str) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE logins
            SET password_hash = $3, updated_at = NOW()
            WHERE user_id = $1 AND provider = $2
            "#,
        )
        .bind(user_id)
        .bind(PROVIDER_PASSWORD)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn insert_session(&self, session: NewSession) -> StoreResult<Session> {
        sqlx::query_as::<_, Session>(&format!(
            r#"
            INSERT INTO sessions (id, user_id, token, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(session.user_id)
        .bind(&session.token)
        .bind(session.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::unique_violation(e, "session token collision"))
    }

    async fn session_by_token(&self, token: &str) -> StoreResult<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn delete_session(&self, token: &str) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_user_sessions(&self, user_id: UserId) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_expired_sessions(&self, now: OffsetDateTime) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn insert_invite(&self, invite: NewInvite) -> StoreResult<Invite> {
        sqlx::query_as::<_, Invite>(&format!(
            r#"
            INSERT INTO invites (id, email, token, invited_by, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {INVITE_COLUMNS}
            "#
        ))
        .bind(InviteId::new())
        .bind(&invite.email)
        .bind(&invite.token)
        .bind(invite.invited_by)
        .bind(invite.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::unique_violation(e, "invite token collision"))
    }

    async fn invite_by_token(&self, token: &str) -> StoreResult<Option<Invite>> {
        let invite = sqlx::query_as::<_, Invite>(&format!(
            "SELECT {INVITE_COLUMNS} FROM invites WHERE token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(invite)
    }

    async fn mark_invite_used(&self, token: &str, now: OffsetDateTime) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE invites
            SET used_at = $2
            WHERE token = $1 AND used_at IS NULL AND expires_at > $2
            "#,
        )
        .bind(token)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn pending_invites(&self, now: OffsetDateTime) -> StoreResult<Vec<Invite>> {
        let invites = sqlx::query_as::<_, Invite>(&format!(
            r#"
            SELECT {INVITE_COLUMNS} FROM invites
            WHERE used_at IS NULL AND expires_at > $1
            ORDER BY created_at DESC
            "#
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(invites)
    }

    async fn delete_invite(&self, id: InviteId) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM invites WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn register_invited_user(
        &self,
        registration: InvitedRegistration,
    ) -> StoreResult<User> {
        let mut tx = self.pool.begin().await?;

        // Consume the invite first; a concurrent registration blocks on the row lock
        // and then matches nothing.
        let email: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE invites
            SET used_at = $2
            WHERE token = $1 AND used_at IS NULL AND expires_at > $2
            RETURNING email
            "#,
        )
        .bind(&registration.token)
        .bind(registration.now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(email) = email else {
            tracing::debug!("Registration matched no redeemable invite");
            return Err(StoreError::InviteUnavailable);
        };

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, email, name, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(UserId::new())
        .bind(&email)
        .bind(&registration.name)
        .bind(Role::User)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| StoreError::unique_violation(e, "email already registered"))?;

        sqlx::query(
            r#"
            INSERT INTO logins (id, user_id, provider, provider_id, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user.id)
        .bind(PROVIDER_PASSWORD)
        .bind(&email)
        .bind(&registration.password_hash)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::unique_violation(e, "email already bound to a login"))?;

        tx.commit().await?;
        tracing::debug!(user_id = %user.id, "Invited user registered");

        Ok(user)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::db::{create_pool, run_migrations};
    use time::Duration;

    async fn store() -> PgCredentialStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = create_pool(&url, 4).await.expect("Failed to create pool");
        run_migrations(&pool).await.expect("Migrations failed");
        PgCredentialStore::new(pool)
    }

    fn unique_email(prefix: &str) -> String {
        format!("{}-{}@example.com", prefix, Uuid::new_v4().simple())
    }

    fn token() -> String {
        Uuid::new_v4().simple().to_string().repeat(2)
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_register_consumes_invite_once() {
        let store = store().await;
        let admin = store
            .insert_user(NewUser {
                email: unique_email("admin"),
                name: "Admin".into(),
                role: Role::Admin,
            })
            .await
            .unwrap();

        let now = OffsetDateTime::now_utc();
        let invite = store
            .insert_invite(NewInvite {
                email: unique_email("guest"),
                token: token(),
                invited_by: admin.id,
                expires_at: now + Duration::days(7),
            })
            .await
            .unwrap();

        let registration = InvitedRegistration {
            token: invite.token.clone(),
            name: "Guest".into(),
            password_hash: "$argon2id$stub".into(),
            now,
        };

        let user = store
            .register_invited_user(registration.clone())
            .await
            .unwrap();
        assert_eq!(user.email, invite.email);
        assert_eq!(user.role, Role::User);

        let again = store.register_invited_user(registration).await;
        assert!(matches!(again, Err(StoreError::InviteUnavailable)));
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_register_rolls_back_on_taken_email() {
        let store = store().await;
        let existing = store
            .insert_user(NewUser {
                email: unique_email("taken"),
                name: "Taken".into(),
                role: Role::Admin,
            })
            .await
            .unwrap();

        let now = OffsetDateTime::now_utc();
        let invite = store
            .insert_invite(NewInvite {
                email: existing.email.clone(),
                token: token(),
                invited_by: existing.id,
                expires_at: now + Duration::days(1),
            })
            .await
            .unwrap();

        let result = store
            .register_invited_user(InvitedRegistration {
                token: invite.token.clone(),
                name: "Dup".into(),
                password_hash: "$argon2id$stub".into(),
                now,
            })
            .await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));

        let invite = store.invite_by_token(&invite.token).await.unwrap().unwrap();
        assert!(invite.used_at.is_none());
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_pending_invites_newest_first() {
        let store = store().await;
        let admin = store
            .insert_user(NewUser {
                email: unique_email("inviter"),
                name: "Inviter".into(),
                role: Role::Admin,
            })
            .await
            .unwrap();

        let mut created = Vec::new();
        for _ in 0..3 {
            let invite = store
                .insert_invite(NewInvite {
                    email: unique_email("pending"),
                    token: token(),
                    invited_by: admin.id,
                    expires_at: OffsetDateTime::now_utc() + Duration::days(1),
                })
                .await
                .unwrap();
            created.push(invite.id);
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        // Other tests share the database; compare only our rows
        let listed: Vec<_> = store
            .pending_invites(OffsetDateTime::now_utc())
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .filter(|id| created.contains(id))
            .collect();
        created.reverse();
        assert_eq!(listed, created);
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_expired_sessions_purged() {
        let store = store().await;
        let user = store
            .insert_user(NewUser {
                email: unique_email("sess"),
                name: "Sess".into(),
                role: Role::User,
            })
            .await
            .unwrap();

        let now = OffsetDateTime::now_utc();
        let stale = store
            .insert_session(NewSession {
                user_id: user.id,
                token: token(),
                expires_at: now - Duration::hours(1),
            })
            .await
            .unwrap();

        assert!(store.delete_expired_sessions(now).await.unwrap() >= 1);
        assert!(store.session_by_token(&stale.token).await.unwrap().is_none());
    }
}
