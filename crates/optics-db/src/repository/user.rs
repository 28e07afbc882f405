//! # User Repository
//!
//! Login accounts, server-side sessions and effective permissions.
//!
//! Password hashing lives in the server; this layer only stores and
//! returns the encoded hash.
//!
//! ## Session Lifecycle
//! ```text
//! login ──► create_session ──► token (cookie / Bearer)
//!                                  │
//!   every request ──► session_user(token) ── expired? ──► None
//!                                  │
//! logout ──► delete_session ◄──────┘
//! ```

use chrono::{DateTime, Duration, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use optics_core::admin::{PermissionSet, User};
use optics_core::validation::validate_required;

use super::new_id;
use crate::error::{DbError, DbResult};

const USER_COLUMNS: &str = "id, username, password_hash, email, is_active, is_superuser, last_login, created_at";

/// Fields of a new account.
#[derive(Debug, Clone, Default)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
    pub email: Option<&'a str>,
    pub is_superuser: bool,
}

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    pub async fn get(&self, id: &str) -> DbResult<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))
    }

    /// Case-insensitive lookup used by login.
    pub async fn find_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1 COLLATE NOCASE");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(username.trim())
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Creates a standalone account (admin bootstrap, seed data).
    pub async fn create(&self, new: &NewUser<'_>) -> DbResult<User> {
        let mut conn = self.pool.acquire().await?;
        let id = insert_user(&mut conn, new).await?;
        drop(conn);

        info!(user_id = %id, username = %new.username, superuser = new.is_superuser, "User created");
        self.get(&id).await
    }

    pub async fn set_password(&self, id: &str, password_hash: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE users SET password_hash = ?2 WHERE id = ?1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }
        Ok(())
    }

    /// Merged flags of every group the user belongs to. Superusers hold
    /// all of them.
    pub async fn permissions(&self, user: &User) -> DbResult<PermissionSet> {
        if user.is_superuser {
            return Ok(PermissionSet::all());
        }

        let groups = sqlx::query_as::<_, PermissionSet>(
            r#"
            SELECT g.view_reports, g.manage_sales, g.manage_inventory, g.manage_customers,
                g.manage_suppliers, g.view_financial, g.manage_settings
            FROM employee_groups g
            JOIN user_groups ug ON ug.group_id = g.id
            WHERE ug.user_id = ?1
            "#,
        )
        .bind(&user.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(groups.into_iter().collect())
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Opens a session that expires after `ttl` and stamps `last_login`.
    pub async fn create_session(&self, user_id: &str, persistent: bool, ttl: Duration) -> DbResult<String> {
        let token = session_token();
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO sessions (token, user_id, persistent, expires_at, created_at) VALUES (?1, ?2, ?3, ?4, ?5)")
            .bind(&token)
            .bind(user_id)
            .bind(persistent)
            .bind(now + ttl)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE users SET last_login = ?2 WHERE id = ?1")
            .bind(user_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(user_id = %user_id, persistent, "Session opened");
        Ok(token)
    }

    /// The active user behind an unexpired session.
    pub async fn session_user(&self, token: &str) -> DbResult<Option<User>> {
        let sql = r#"
            SELECT u.id, u.username, u.password_hash, u.email, u.is_active, u.is_superuser,
                u.last_login, u.created_at
            FROM users u
            JOIN sessions s ON s.user_id = u.id
            WHERE s.token = ?1 AND s.expires_at > ?2 AND u.is_active = 1
        "#;
        let user = sqlx::query_as::<_, User>(sql)
            .bind(token)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?;

        if user.is_none() {
            debug!("Session token rejected");
        }
        Ok(user)
    }

    pub async fn delete_session(&self, token: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM sessions WHERE token = ?1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Drops every expired session; returns how many went.
    pub async fn purge_expired_sessions(&self) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?1")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Inserts a user on `conn`; employee creation calls this inside its own
/// transaction.
pub(crate) async fn insert_user(conn: &mut SqliteConnection, new: &NewUser<'_>) -> DbResult<String> {
    let username = validate_required("username", new.username, 150)?.to_lowercase();
    let id = new_id();

    sqlx::query(
        r#"
        INSERT INTO users (id, username, password_hash, email, is_active, is_superuser, created_at)
        VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6)
        "#,
    )
    .bind(&id)
    .bind(&username)
    .bind(new.password_hash)
    .bind(new.email)
    .bind(new.is_superuser)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::UniqueViolation { .. } => DbError::duplicate("username", username.clone()),
        other => other,
    })?;

    Ok(id)
}

/// True when the user holds a session that has not expired yet.
pub(crate) async fn has_live_session(conn: &mut SqliteConnection, user_id: &str, now: DateTime<Utc>) -> DbResult<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE user_id = ?1 AND expires_at > ?2")
        .bind(user_id)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count > 0)
}

fn session_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use optics_core::admin::Permission;

    async fn admin(db: &Database, superuser: bool) -> User {
        db.users()
            .create(&NewUser {
                username: "Admin",
                password_hash: "$argon2id$stub",
                email: Some("admin@example.com"),
                is_superuser: superuser,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_find_case_insensitive() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let user = admin(&db, true).await;

        assert_eq!(user.username, "admin");
        let found = db.users().find_by_username("ADMIN").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);

        let dup = db
            .users()
            .create(&NewUser {
                username: "admin",
                password_hash: "x",
                ..Default::default()
            })
            .await;
        assert!(matches!(dup, Err(DbError::UniqueViolation { .. })));
    }

    #[tokio::test]
    async fn test_session_roundtrip_and_expiry() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let user = admin(&db, false).await;
        let users = db.users();

        let token = users.create_session(&user.id, false, Duration::hours(12)).await.unwrap();
        assert_eq!(token.len(), 64);
        let current = users.session_user(&token).await.unwrap().unwrap();
        assert_eq!(current.id, user.id);
        assert!(current.last_login.is_some());

        let stale = users.create_session(&user.id, true, Duration::seconds(-1)).await.unwrap();
        assert!(users.session_user(&stale).await.unwrap().is_none());
        assert_eq!(users.purge_expired_sessions().await.unwrap(), 1);

        users.delete_session(&token).await.unwrap();
        assert!(users.session_user(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_superuser_holds_everything() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let root = admin(&db, true).await;
        let perms = db.users().permissions(&root).await.unwrap();
        assert!(Permission::ALL.iter().all(|p| perms.allows(*p)));
    }
}
