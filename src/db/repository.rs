//! User repository for Cumulus.

use sqlx::SqlitePool;

use super::user::{normalize_email, NewUser, User};
use crate::datetime;
use crate::{CumulusError, Result};

const USER_COLUMNS: &str = "id, name, email, password, storage_limit, created_at, updated_at";

/// Repository for user CRUD operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new UserRepository with the given pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user.
    ///
    /// Fails with [`CumulusError::Conflict`] when the email is taken.
    pub async fn create(&self, new_user: &NewUser) -> Result<User> {
        let now = datetime::now();
        let result = sqlx::query(
            "INSERT INTO users (name, email, password, storage_limit, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(&new_user.password)
        .bind(new_user.storage_limit)
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await
        .map_err(|e| CumulusError::from_insert(e, "email"))?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .ok_or_else(|| CumulusError::NotFound("user".to_string()))
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| CumulusError::Database(e.to_string()))?;
        Ok(user)
    }

    /// Get a user by email (case-insensitive).
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(normalize_email(email))
            .fetch_optional(self.pool)
            .await
            .map_err(|e| CumulusError::Database(e.to_string()))?;
        Ok(user)
    }

    /// Delete a user by ID. Owned folders, files and shares cascade.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| CumulusError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn alice() -> NewUser {
        NewUser::new("Alice", "Alice@Example.com", "hash", 1000)
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = UserRepository::new(db.pool());

        let user = repo.create(&alice()).await.unwrap();
        assert_eq!(user.name, "Alice");
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.storage_limit, 1000);

        let fetched = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(fetched.email, user.email);
        assert!(repo.get_by_id(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_by_email_case_insensitive() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = UserRepository::new(db.pool());
        let user = repo.create(&alice()).await.unwrap();

        let found = repo.get_by_email("ALICE@example.COM").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));
        assert!(repo.get_by_email("bob@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = UserRepository::new(db.pool());
        repo.create(&alice()).await.unwrap();

        let dup = NewUser::new("Other", "alice@EXAMPLE.com", "hash", 1000);
        let err = repo.create(&dup).await.unwrap_err();
        assert!(matches!(err, CumulusError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_delete_user() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = UserRepository::new(db.pool());
        let user = repo.create(&alice()).await.unwrap();

        assert!(repo.delete(user.id).await.unwrap());
        assert!(!repo.delete(user.id).await.unwrap());
    }
}
