//! Folder model and repository.
//!
//! Each folder stores its ancestor chain as a materialized path. The path is
//! encoded as `/` for a root folder and `/1/5/` for a folder whose parent is
//! 5 and grandparent is 1, so every descendant of folder `x` with path `p`
//! has a path starting with `p` + `x/`.

use std::fmt;

use sqlx::{SqliteConnection, SqlitePool};

use super::access::{Permission, Shareable};
use super::share::{ResourceKind, ShareEntry, ShareRepository};
use crate::datetime;
use crate::{CumulusError, Result};

/// Ordered ancestor ids of a folder, root first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderPath(Vec<i64>);

/// Error for malformed stored paths.
#[derive(Debug, thiserror::Error)]
#[error("malformed folder path: {0:?}")]
pub struct FolderPathError(String);

impl FolderPath {
    /// Path of a root folder.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_ids(ids: Vec<i64>) -> Self {
        Self(ids)
    }

    /// Path of a direct child of the folder `parent_id` whose path is `self`.
    pub fn child(&self, parent_id: i64) -> Self {
        let mut ids = self.0.clone();
        ids.push(parent_id);
        Self(ids)
    }

    pub fn ids(&self) -> &[i64] {
        &self.0
    }

    /// Number of ancestors.
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.0.contains(&id)
    }

    /// Path prefix shared by every descendant of folder `id` located at `self`.
    pub fn subtree_prefix(&self, id: i64) -> String {
        format!("{self}{id}/")
    }

    /// GLOB pattern matching the paths of every descendant of folder `id`.
    ///
    /// Paths hold only digits and `/`, so no character needs escaping, and
    /// unlike LIKE the match is case-sensitive and can use the path index.
    pub fn subtree_glob(&self, id: i64) -> String {
        format!("{}*", self.subtree_prefix(id))
    }
}

impl fmt::Display for FolderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("/")?;
        for id in &self.0 {
            write!(f, "{id}/")?;
        }
        Ok(())
    }
}

impl TryFrom<String> for FolderPath {
    type Error = FolderPathError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        let inner = value
            .strip_prefix('/')
            .and_then(|s| if s.is_empty() { Some(s) } else { s.strip_suffix('/') })
            .ok_or_else(|| FolderPathError(value.clone()))?;

        if inner.is_empty() {
            return Ok(Self::root());
        }

        inner
            .split('/')
            .map(|part| part.parse::<i64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(Self)
            .map_err(|_| FolderPathError(value.clone()))
    }
}

/// Folder entity.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Folder {
    pub id: i64,
    pub name: String,
    pub owner_id: i64,
    /// `None` for a root folder.
    pub parent_id: Option<i64>,
    #[sqlx(try_from = "String")]
    pub path: FolderPath,
    pub is_public: bool,
    pub public_link: Option<String>,
    pub is_starred: bool,
    pub starred_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    /// Populated by single-folder lookups; empty in listings.
    #[sqlx(skip)]
    pub shared_with: Vec<ShareEntry>,
}

impl Shareable for Folder {
    fn owner_id(&self) -> i64 {
        self.owner_id
    }

    fn is_public(&self) -> bool {
        self.is_public
    }

    fn shared_permission(&self, user_id: i64) -> Option<Permission> {
        self.shared_with
            .iter()
            .find(|s| s.user_id == user_id)
            .map(|s| s.permission)
    }
}

/// Data for creating a new folder.
#[derive(Debug, Clone)]
pub struct NewFolder {
    pub name: String,
    pub owner_id: i64,
    pub parent_id: Option<i64>,
    pub path: FolderPath,
}

impl NewFolder {
    /// A folder at the owner's root.
    pub fn root(name: impl Into<String>, owner_id: i64) -> Self {
        Self {
            name: name.into(),
            owner_id,
            parent_id: None,
            path: FolderPath::root(),
        }
    }

    /// A folder nested directly under `parent`.
    pub fn under(name: impl Into<String>, parent: &Folder) -> Self {
        Self {
            name: name.into(),
            owner_id: parent.owner_id,
            parent_id: Some(parent.id),
            path: parent.path.child(parent.id),
        }
    }
}

/// Minimal projection used for subtree walks.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FolderNode {
    pub id: i64,
    #[sqlx(try_from = "String")]
    pub path: FolderPath,
}

impl FolderNode {
    fn subtree_glob(&self) -> String {
        self.path.subtree_glob(self.id)
    }
}

const FOLDER_COLUMNS: &str = "id, name, owner_id, parent_id, path, is_public, public_link, \
                              is_starred, starred_at, created_at, updated_at";

/// Repository for folder persistence.
pub struct FolderRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FolderRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a folder.
    pub async fn create(&self, folder: &NewFolder) -> Result<Folder> {
        let now = datetime::now();
        let result = sqlx::query(
            "INSERT INTO folders (name, owner_id, parent_id, path, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&folder.name)
        .bind(folder.owner_id)
        .bind(folder.parent_id)
        .bind(folder.path.to_string())
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await
        .map_err(|e| CumulusError::Database(e.to_string()))?;

        self.get_by_id(result.last_insert_rowid())
            .await?
            .ok_or_else(|| CumulusError::NotFound("folder".to_string()))
    }

    /// Get a folder by ID, including its share list.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Folder>> {
        let sql = format!("SELECT {FOLDER_COLUMNS} FROM folders WHERE id = ?");
        let folder = sqlx::query_as::<_, Folder>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| CumulusError::Database(e.to_string()))?;

        match folder {
            Some(mut folder) => {
                folder.shared_with = ShareRepository::new(self.pool, ResourceKind::Folder)
                    .list(folder.id)
                    .await?;
                Ok(Some(folder))
            }
            None => Ok(None),
        }
    }

    /// Get a folder only if `owner_id` owns it.
    pub async fn get_owned(&self, id: i64, owner_id: i64) -> Result<Option<Folder>> {
        Ok(self
            .get_by_id(id)
            .await?
            .filter(|f| f.owner_id == owner_id))
    }

    /// Direct children of `parent_id` (root when `None`) owned by `owner_id`.
    pub async fn list_children(&self, owner_id: i64, parent_id: Option<i64>) -> Result<Vec<Folder>> {
        let sql = format!(
            "SELECT {FOLDER_COLUMNS} FROM folders
             WHERE owner_id = ? AND parent_id IS ?
             ORDER BY name COLLATE NOCASE, id"
        );
        let folders = sqlx::query_as::<_, Folder>(&sql)
            .bind(owner_id)
            .bind(parent_id)
            .fetch_all(self.pool)
            .await
            .map_err(|e| CumulusError::Database(e.to_string()))?;
        Ok(folders)
    }

    /// Starred folders, most recently starred first.
    pub async fn list_starred(&self, owner_id: i64) -> Result<Vec<Folder>> {
        let sql = format!(
            "SELECT {FOLDER_COLUMNS} FROM folders
             WHERE owner_id = ? AND is_starred = 1
             ORDER BY starred_at DESC, id DESC"
        );
        let folders = sqlx::query_as::<_, Folder>(&sql)
            .bind(owner_id)
            .fetch_all(self.pool)
            .await
            .map_err(|e| CumulusError::Database(e.to_string()))?;
        Ok(folders)
    }

    /// Folders shared with `user_id`, most recently updated first.
    pub async fn list_shared_with(&self, user_id: i64) -> Result<Vec<Folder>> {
        let sql = format!(
            "SELECT {FOLDER_COLUMNS} FROM folders
             WHERE id IN (SELECT resource_id FROM folder_shares WHERE user_id = ?)
             ORDER BY updated_at DESC, id DESC"
        );
        let folders = sqlx::query_as::<_, Folder>(&sql)
            .bind(user_id)
            .fetch_all(self.pool)
            .await
            .map_err(|e| CumulusError::Database(e.to_string()))?;
        Ok(folders)
    }

    /// Folders named by `path`, in path order.
    pub async fn list_ancestors(&self, path: &FolderPath) -> Result<Vec<Folder>> {
        let mut ancestors = Vec::with_capacity(path.depth());
        for id in path.ids() {
            let sql = format!("SELECT {FOLDER_COLUMNS} FROM folders WHERE id = ?");
            let folder = sqlx::query_as::<_, Folder>(&sql)
                .bind(id)
                .fetch_optional(self.pool)
                .await
                .map_err(|e| CumulusError::Database(e.to_string()))?;
            if let Some(folder) = folder {
                ancestors.push(folder);
            }
        }
        Ok(ancestors)
    }

    /// Rename a folder. Returns false if it does not exist.
    pub async fn rename(&self, id: i64, name: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE folders SET name = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(datetime::now())
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| CumulusError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    /// Set or clear the public flag and link.
    pub async fn set_public_link(&self, id: i64, link: Option<&str>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE folders SET is_public = ?, public_link = ?, updated_at = ? WHERE id = ?",
        )
        .bind(link.is_some())
        .bind(link)
        .bind(datetime::now())
        .bind(id)
        .execute(self.pool)
        .await
        .map_err(|e| CumulusError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    /// Flip the star flag, setting or clearing `starred_at` with it.
    pub async fn toggle_star(&self, id: i64) -> Result<bool> {
        let now = datetime::now();
        let result = sqlx::query(
            "UPDATE folders
             SET is_starred = NOT is_starred,
                 starred_at = CASE WHEN is_starred = 1 THEN NULL ELSE ? END,
                 updated_at = ?
             WHERE id = ?",
        )
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(self.pool)
        .await
        .map_err(|e| CumulusError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    /// Re-parent folder `id` under `dest_id` (root when `None`) and rewrite
    /// the paths of its whole subtree.
    ///
    /// Both paths are read inside the write transaction, so concurrent moves
    /// of overlapping subtrees see each other's result. Fails with a
    /// validation error if the destination is the folder itself or one of
    /// its descendants, or if the subtree would end up deeper than
    /// `max_depth`.
    pub async fn move_subtree(&self, id: i64, dest_id: Option<i64>, max_depth: usize) -> Result<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CumulusError::Database(e.to_string()))?;

        let now = datetime::now();
        touch(&mut tx, id, &now).await?;
        let folder = node(&mut tx, id).await?;

        let new_path = match dest_id {
            Some(dest_id) => {
                let dest = node(&mut tx, dest_id).await?;
                if dest.id == folder.id || dest.path.contains(folder.id) {
                    return Err(CumulusError::Validation(
                        "Cannot move a folder into itself or its subfolder".to_string(),
                    ));
                }
                dest.path.child(dest.id)
            }
            None => FolderPath::root(),
        };

        let base_depth = folder.path.depth();
        let deepest_below = descendants(&mut tx, &folder)
            .await?
            .iter()
            .map(|n| n.path.depth() - base_depth)
            .max()
            .unwrap_or(0);
        check_depth(new_path.depth() + deepest_below, max_depth)?;

        let old_prefix = folder.path.subtree_prefix(folder.id);
        let new_prefix = new_path.subtree_prefix(folder.id);

        sqlx::query("UPDATE folders SET parent_id = ?, path = ?, updated_at = ? WHERE id = ?")
            .bind(dest_id)
            .bind(new_path.to_string())
            .bind(&now)
            .bind(folder.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| CumulusError::Database(e.to_string()))?;

        // substr() is 1-based; paths are ASCII so byte length equals char length.
        let rewritten = sqlx::query(
            "UPDATE folders SET path = ? || substr(path, ?) WHERE path GLOB ?",
        )
        .bind(&new_prefix)
        .bind(old_prefix.len() as i64 + 1)
        .bind(folder.subtree_glob())
        .execute(&mut *tx)
        .await
        .map_err(|e| CumulusError::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| CumulusError::Database(e.to_string()))?;
        Ok(rewritten.rows_affected())
    }

    /// Delete folder `id`, every descendant folder and every file inside them.
    ///
    /// Refuses with a validation error when the tree holds more than
    /// `max_batch` folders. The returned object ids belong to the deleted
    /// files and are no longer referenced by any record.
    pub async fn delete_subtree(&self, id: i64, max_batch: usize) -> Result<SubtreeDeletion> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CumulusError::Database(e.to_string()))?;

        touch(&mut tx, id, &datetime::now()).await?;
        let folder = node(&mut tx, id).await?;
        let pattern = folder.subtree_glob();

        let below = descendants(&mut tx, &folder).await?.len();
        if below + 1 > max_batch {
            return Err(CumulusError::Validation(format!(
                "Folder tree is too large to delete at once (more than {max_batch} folders)"
            )));
        }

        let object_ids: Vec<String> = sqlx::query_scalar(
            "SELECT object_id FROM files WHERE folder_id IN
                (SELECT id FROM folders WHERE id = ? OR path GLOB ?)",
        )
        .bind(folder.id)
        .bind(&pattern)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| CumulusError::Database(e.to_string()))?;

        let files = sqlx::query(
            "DELETE FROM files WHERE folder_id IN
                (SELECT id FROM folders WHERE id = ? OR path GLOB ?)",
        )
        .bind(folder.id)
        .bind(&pattern)
        .execute(&mut *tx)
        .await
        .map_err(|e| CumulusError::Database(e.to_string()))?;

        let folders = sqlx::query("DELETE FROM folders WHERE id = ? OR path GLOB ?")
            .bind(folder.id)
            .bind(&pattern)
            .execute(&mut *tx)
            .await
            .map_err(|e| CumulusError::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| CumulusError::Database(e.to_string()))?;
        Ok(SubtreeDeletion {
            folders: folders.rows_affected(),
            files: files.rows_affected(),
            object_ids,
        })
    }
}

/// Records removed by [`FolderRepository::delete_subtree`].
#[derive(Debug, Clone)]
pub struct SubtreeDeletion {
    pub folders: u64,
    pub files: u64,
    pub object_ids: Vec<String>,
}

/// Reject a folder nested more than `max_depth` levels deep.
pub(crate) fn check_depth(depth: usize, max_depth: usize) -> Result<()> {
    if depth > max_depth {
        return Err(CumulusError::Validation(format!(
            "Folders cannot be nested more than {max_depth} levels deep"
        )));
    }
    Ok(())
}

// Writing first takes SQLite's write lock, so the reads that follow in the
// same transaction see the latest committed paths.
async fn touch(conn: &mut SqliteConnection, id: i64, now: &str) -> Result<()> {
    let result = sqlx::query("UPDATE folders SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(|e| CumulusError::Database(e.to_string()))?;
    if result.rows_affected() == 0 {
        return Err(CumulusError::NotFound("folder".to_string()));
    }
    Ok(())
}

async fn node(conn: &mut SqliteConnection, id: i64) -> Result<FolderNode> {
    sqlx::query_as::<_, FolderNode>("SELECT id, path FROM folders WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| CumulusError::Database(e.to_string()))?
        .ok_or_else(|| CumulusError::NotFound("folder".to_string()))
}

/// Every folder below `folder`, not including it.
async fn descendants(conn: &mut SqliteConnection, folder: &FolderNode) -> Result<Vec<FolderNode>> {
    sqlx::query_as::<_, FolderNode>("SELECT id, path FROM folders WHERE path GLOB ? ORDER BY id")
        .bind(folder.subtree_glob())
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| CumulusError::Database(e.to_string()))
}
