//! Refresh token storage for the cookie-based session flow.

use sqlx::SqlitePool;

use crate::{CumulusError, Result};

/// Format of `expires_at`, matching SQLite's `datetime('now')`.
pub const EXPIRY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Refresh token entity.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshToken {
    pub id: i64,
    pub user_id: i64,
    /// Opaque token string sent to the client in the cookie.
    pub token: String,
    pub expires_at: String,
    pub created_at: String,
    /// Revocation timestamp (None if not revoked).
    pub revoked_at: Option<String>,
}

/// New refresh token for creation.
#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub user_id: i64,
    pub token: String,
    pub expires_at: String,
}

impl NewRefreshToken {
    /// Token for `user_id` that expires `days` from now.
    pub fn expiring_in_days(user_id: i64, token: impl Into<String>, days: u64) -> Self {
        let expires_at = chrono::Utc::now() + chrono::Duration::days(days as i64);
        Self {
            user_id,
            token: token.into(),
            expires_at: expires_at.format(EXPIRY_FORMAT).to_string(),
        }
    }
}

/// Repository for refresh token operations.
pub struct RefreshTokenRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> RefreshTokenRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a new refresh token.
    pub async fn create(&self, new_token: &NewRefreshToken) -> Result<RefreshToken> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO refresh_tokens (user_id, token, expires_at) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(new_token.user_id)
        .bind(&new_token.token)
        .bind(&new_token.expires_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| CumulusError::Database(e.to_string()))?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| CumulusError::NotFound("refresh token".into()))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<RefreshToken>> {
        let token = sqlx::query_as::<_, RefreshToken>(
            "SELECT id, user_id, token, expires_at, created_at, revoked_at
             FROM refresh_tokens WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| CumulusError::Database(e.to_string()))?;
        Ok(token)
    }

    pub async fn get_by_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        let result = sqlx::query_as::<_, RefreshToken>(
            "SELECT id, user_id, token, expires_at, created_at, revoked_at
             FROM refresh_tokens WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| CumulusError::Database(e.to_string()))?;
        Ok(result)
    }

    /// Get a token that is neither expired nor revoked.
    pub async fn get_valid_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        let result = sqlx::query_as::<_, RefreshToken>(
            "SELECT id, user_id, token, expires_at, created_at, revoked_at
             FROM refresh_tokens
             WHERE token = ? AND revoked_at IS NULL AND expires_at > datetime('now')",
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| CumulusError::Database(e.to_string()))?;
        Ok(result)
    }

    /// Revoke `old` and store `new` atomically.
    ///
    /// Returns `false` (and stores nothing) when `old` was already revoked,
    /// so a replayed cookie cannot mint a second session.
    pub async fn rotate(&self, old: &str, new_token: &NewRefreshToken) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CumulusError::Database(e.to_string()))?;

        let revoked = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = datetime('now')
             WHERE token = ? AND revoked_at IS NULL",
        )
        .bind(old)
        .execute(&mut *tx)
        .await
        .map_err(|e| CumulusError::Database(e.to_string()))?;

        if revoked.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| CumulusError::Database(e.to_string()))?;
            return Ok(false);
        }

        sqlx::query("INSERT INTO refresh_tokens (user_id, token, expires_at) VALUES (?, ?, ?)")
            .bind(new_token.user_id)
            .bind(&new_token.token)
            .bind(&new_token.expires_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| CumulusError::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| CumulusError::Database(e.to_string()))?;
        Ok(true)
    }

    /// Revoke a refresh token.
    pub async fn revoke(&self, token: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = datetime('now')
             WHERE token = ? AND revoked_at IS NULL",
        )
        .bind(token)
        .execute(self.pool)
        .await
        .map_err(|e| CumulusError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    /// Revoke every session of a user.
    pub async fn revoke_all_for_user(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = datetime('now')
             WHERE user_id = ? AND revoked_at IS NULL",
        )
        .bind(user_id)
        .execute(self.pool)
        .await
        .map_err(|e| CumulusError::Database(e.to_string()))?;
        Ok(result.rows_affected())
    }

    /// Delete expired and revoked tokens.
    pub async fn cleanup_expired(&self) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM refresh_tokens
             WHERE expires_at < datetime('now') OR revoked_at IS NOT NULL",
        )
        .execute(self.pool)
        .await
        .map_err(|e| CumulusError::Database(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewUser, UserRepository};
    use crate::Database;

    async fn setup_db() -> (Database, i64) {
        let db = Database::open_in_memory().await.unwrap();
        let user = UserRepository::new(db.pool())
            .create(&NewUser::new("Test", "test@example.com", "hash", 100))
            .await
            .unwrap();
        (db, user.id)
    }

    fn token(user_id: i64, value: &str, expires_at: &str) -> NewRefreshToken {
        NewRefreshToken {
            user_id,
            token: value.to_string(),
            expires_at: expires_at.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let (db, uid) = setup_db().await;
        let repo = RefreshTokenRepository::new(db.pool());

        let created = repo
            .create(&NewRefreshToken::expiring_in_days(uid, "tok-1", 7))
            .await
            .unwrap();
        assert_eq!(created.user_id, uid);
        assert!(created.revoked_at.is_none());

        assert!(repo.get_by_token("tok-1").await.unwrap().is_some());
        assert!(repo.get_valid_token("tok-1").await.unwrap().is_some());
        assert!(repo.get_by_token("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_token_is_invalid() {
        let (db, uid) = setup_db().await;
        let repo = RefreshTokenRepository::new(db.pool());
        repo.create(&token(uid, "old", "2000-01-01 00:00:00"))
            .await
            .unwrap();

        assert!(repo.get_valid_token("old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revoke_token() {
        let (db, uid) = setup_db().await;
        let repo = RefreshTokenRepository::new(db.pool());
        repo.create(&token(uid, "revoke-me", "2099-12-31 23:59:59"))
            .await
            .unwrap();

        assert!(repo.revoke("revoke-me").await.unwrap());
        assert!(!repo.revoke("revoke-me").await.unwrap());
        assert!(repo.get_valid_token("revoke-me").await.unwrap().is_none());

        let stored = repo.get_by_token("revoke-me").await.unwrap().unwrap();
        assert!(stored.revoked_at.is_some());
    }

    #[tokio::test]
    async fn test_rotate_token() {
        let (db, uid) = setup_db().await;
        let repo = RefreshTokenRepository::new(db.pool());
        repo.create(&token(uid, "first", "2099-12-31 23:59:59"))
            .await
            .unwrap();

        let rotated = repo
            .rotate("first", &token(uid, "second", "2099-12-31 23:59:59"))
            .await
            .unwrap();
        assert!(rotated);
        assert!(repo.get_valid_token("first").await.unwrap().is_none());
        assert!(repo.get_valid_token("second").await.unwrap().is_some());

        // Replaying the old token stores nothing.
        let replay = repo
            .rotate("first", &token(uid, "third", "2099-12-31 23:59:59"))
            .await
            .unwrap();
        assert!(!replay);
        assert!(repo.get_by_token("third").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revoke_all_for_user() {
        let (db, uid) = setup_db().await;
        let repo = RefreshTokenRepository::new(db.pool());
        for i in 0..3 {
            repo.create(&token(uid, &format!("t-{i}"), "2099-12-31 23:59:59"))
                .await
                .unwrap();
        }

        assert_eq!(repo.revoke_all_for_user(uid).await.unwrap(), 3);
        assert!(repo.get_valid_token("t-0").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let (db, uid) = setup_db().await;
        let repo = RefreshTokenRepository::new(db.pool());
        repo.create(&token(uid, "old-expired", "2000-01-01 00:00:00"))
            .await
            .unwrap();
        repo.create(&token(uid, "still-valid", "2099-12-31 23:59:59"))
            .await
            .unwrap();

        assert_eq!(repo.cleanup_expired().await.unwrap(), 1);
        assert!(repo.get_by_token("old-expired").await.unwrap().is_none());
        assert!(repo.get_by_token("still-valid").await.unwrap().is_some());
    }
}
