//! Share lists for files and folders.

use sqlx::SqlitePool;

use super::access::Permission;
use crate::datetime;
use crate::db::{User, UserRepository};
use crate::{CumulusError, Result};

/// Which kind of entity a share list belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    File,
    Folder,
}

impl ResourceKind {
    fn table(&self) -> &'static str {
        match self {
            ResourceKind::File => "file_shares",
            ResourceKind::Folder => "folder_shares",
        }
    }

    /// Lowercase name used in messages and public links.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::File => "file",
            ResourceKind::Folder => "folder",
        }
    }
}

/// One entry of a share list, with the target user's identity.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ShareEntry {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    #[sqlx(try_from = "String")]
    pub permission: Permission,
}

/// The user a share request points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareTarget {
    UserId(i64),
    Email(String),
}

impl ShareTarget {
    /// Pick the target from optional request fields; the id wins when both
    /// are present.
    pub fn from_parts(user_id: Option<i64>, user_email: Option<&str>) -> Result<Self> {
        match (user_id, user_email.map(str::trim).filter(|e| !e.is_empty())) {
            (Some(id), _) => Ok(ShareTarget::UserId(id)),
            (None, Some(email)) => Ok(ShareTarget::Email(email.to_string())),
            (None, None) => Err(CumulusError::Validation(
                "user_id or user_email is required".to_string(),
            )),
        }
    }

    /// Look the target user up. Sharing with `owner_id` itself is rejected.
    pub async fn resolve(&self, pool: &SqlitePool, owner_id: i64) -> Result<User> {
        let users = UserRepository::new(pool);
        let user = match self {
            ShareTarget::UserId(id) => users.get_by_id(*id).await?,
            ShareTarget::Email(email) => users.get_by_email(email).await?,
        }
        .ok_or_else(|| CumulusError::NotFound("user".to_string()))?;

        if user.id == owner_id {
            return Err(CumulusError::Validation(
                "Cannot share with yourself".to_string(),
            ));
        }
        Ok(user)
    }
}

/// Repository for one share table.
pub struct ShareRepository<'a> {
    pool: &'a SqlitePool,
    kind: ResourceKind,
}

impl<'a> ShareRepository<'a> {
    pub fn new(pool: &'a SqlitePool, kind: ResourceKind) -> Self {
        Self { pool, kind }
    }

    /// Share list of an entity, oldest entry first.
    pub async fn list(&self, resource_id: i64) -> Result<Vec<ShareEntry>> {
        let sql = format!(
            "SELECT s.user_id, u.name, u.email, s.permission
             FROM {} s JOIN users u ON u.id = s.user_id
             WHERE s.resource_id = ?
             ORDER BY s.created_at, s.user_id",
            self.kind.table()
        );
        let entries = sqlx::query_as::<_, ShareEntry>(&sql)
            .bind(resource_id)
            .fetch_all(self.pool)
            .await
            .map_err(|e| CumulusError::Database(e.to_string()))?;
        Ok(entries)
    }

    /// Add `user_id` to the share list or update their permission.
    pub async fn upsert(&self, resource_id: i64, user_id: i64, permission: Permission) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (resource_id, user_id, permission, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(resource_id, user_id) DO UPDATE SET permission = excluded.permission",
            self.kind.table()
        );
        sqlx::query(&sql)
            .bind(resource_id)
            .bind(user_id)
            .bind(permission.as_str())
            .bind(datetime::now())
            .execute(self.pool)
            .await
            .map_err(|e| CumulusError::Database(e.to_string()))?;
        Ok(())
    }

    /// Remove `user_id` from the share list.
    pub async fn remove(&self, resource_id: i64, user_id: i64) -> Result<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE resource_id = ? AND user_id = ?",
            self.kind.table()
        );
        let result = sqlx::query(&sql)
            .bind(resource_id)
            .bind(user_id)
            .execute(self.pool)
            .await
            .map_err(|e| CumulusError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }
}
