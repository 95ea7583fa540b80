//! File model and repository.

use std::fmt;

use serde::Serialize;
use sqlx::{QueryBuilder, SqlitePool};

use super::access::{Permission, Shareable};
use super::share::{ResourceKind, ShareEntry, ShareRepository};
use crate::datetime;
use crate::{CumulusError, Result};

/// Coarse content category derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Video,
    Pdf,
    Other,
}

impl FileKind {
    /// Classify a lowercase extension (without the dot).
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "jpg" | "jpeg" | "png" | "gif" | "webp" => FileKind::Image,
            "mp4" | "mov" | "avi" | "mkv" => FileKind::Video,
            "pdf" => FileKind::Pdf,
            _ => FileKind::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Image => "image",
            FileKind::Video => "video",
            FileKind::Pdf => "pdf",
            FileKind::Other => "other",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for FileKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "image" => FileKind::Image,
            "video" => FileKind::Video,
            "pdf" => FileKind::Pdf,
            _ => FileKind::Other,
        }
    }
}

/// Lowercase extension of `name`, or an empty string.
pub fn extension_of(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_lowercase(),
        _ => String::new(),
    }
}

/// Stored file entity.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DriveFile {
    pub id: i64,
    pub name: String,
    /// URL served by the object store.
    pub url: String,
    /// Object store handle used for deletion.
    pub object_id: String,
    pub size: i64,
    #[sqlx(try_from = "String")]
    pub kind: FileKind,
    pub extension: String,
    pub owner_id: i64,
    /// `None` when the file sits at the owner's root.
    pub folder_id: Option<i64>,
    pub is_public: bool,
    pub public_link: Option<String>,
    pub is_deleted: bool,
    pub deleted_at: Option<String>,
    pub is_starred: bool,
    pub starred_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    /// Populated by single-file lookups; empty in listings.
    #[sqlx(skip)]
    pub shared_with: Vec<ShareEntry>,
}

impl Shareable for DriveFile {
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

/// File joined with its owner's identity, for shared and public views.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OwnedFile {
    #[sqlx(flatten)]
    pub file: DriveFile,
    pub owner_name: String,
    pub owner_email: String,
}

/// Data for creating a new file record.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub name: String,
    pub url: String,
    pub object_id: String,
    pub size: i64,
    pub owner_id: i64,
    pub folder_id: Option<i64>,
}

impl NewFile {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        object_id: impl Into<String>,
        size: i64,
        owner_id: i64,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            object_id: object_id.into(),
            size,
            owner_id,
            folder_id: None,
        }
    }

    /// Place the file inside `folder_id`.
    pub fn in_folder(mut self, folder_id: Option<i64>) -> Self {
        self.folder_id = folder_id;
        self
    }

    pub fn extension(&self) -> String {
        extension_of(&self.name)
    }

    pub fn kind(&self) -> FileKind {
        FileKind::from_extension(&self.extension())
    }
}

/// Partial update of a file record.
#[derive(Debug, Clone, Default)]
pub struct FileUpdate {
    pub name: Option<String>,
    /// `Some(None)` moves the file to the root.
    pub folder_id: Option<Option<i64>>,
    /// `Some(None)` revokes the public link.
    pub public_link: Option<Option<String>>,
}

impl FileUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn folder(mut self, folder_id: Option<i64>) -> Self {
        self.folder_id = Some(folder_id);
        self
    }

    pub fn public_link(mut self, link: Option<String>) -> Self {
        self.public_link = Some(link);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.folder_id.is_none() && self.public_link.is_none()
    }
}

/// Per-owner byte totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct StorageTotals {
    /// Sum of all file sizes, trashed included.
    pub used: i64,
    /// Sum of trashed file sizes.
    pub trashed: i64,
}

const FILE_COLUMNS: &str = "id, name, url, object_id, size, kind, extension, owner_id, folder_id, \
                            is_public, public_link, is_deleted, deleted_at, is_starred, starred_at, \
                            created_at, updated_at";

/// Repository for file persistence.
pub struct FileRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FileRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a file record.
    pub async fn create(&self, file: &NewFile) -> Result<DriveFile> {
        let now = datetime::now();
        let result = sqlx::query(
            "INSERT INTO files (name, url, object_id, size, kind, extension, owner_id, folder_id,
                                created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&file.name)
        .bind(&file.url)
        .bind(&file.object_id)
        .bind(file.size)
        .bind(file.kind().as_str())
        .bind(file.extension())
        .bind(file.owner_id)
        .bind(file.folder_id)
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await
        .map_err(|e| CumulusError::Database(e.to_string()))?;

        self.get_by_id(result.last_insert_rowid())
            .await?
            .ok_or_else(|| CumulusError::NotFound("file".to_string()))
    }

    /// Get a file by ID in any trash state, including its share list.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<DriveFile>> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ?");
        let file = sqlx::query_as::<_, DriveFile>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| CumulusError::Database(e.to_string()))?;

        match file {
            Some(mut file) => {
                file.shared_with = ShareRepository::new(self.pool, ResourceKind::File)
                    .list(file.id)
                    .await?;
                Ok(Some(file))
            }
            None => Ok(None),
        }
    }

    /// Get a file only if `owner_id` owns it.
    pub async fn get_owned(&self, id: i64, owner_id: i64) -> Result<Option<DriveFile>> {
        Ok(self.get_by_id(id).await?.filter(|f| f.owner_id == owner_id))
    }

    /// A public, non-trashed file with its owner.
    pub async fn get_public(&self, id: i64) -> Result<Option<OwnedFile>> {
        let sql = format!(
            "SELECT {}, u.name AS owner_name, u.email AS owner_email
             FROM files f JOIN users u ON u.id = f.owner_id
             WHERE f.id = ? AND f.is_public = 1 AND f.is_deleted = 0",
            qualified_columns("f")
        );
        let file = sqlx::query_as::<_, OwnedFile>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| CumulusError::Database(e.to_string()))?;
        Ok(file)
    }

    /// Non-trashed files directly in `folder_id` (root when `None`).
    pub async fn list_in_folder(&self, owner_id: i64, folder_id: Option<i64>) -> Result<Vec<DriveFile>> {
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM files
             WHERE owner_id = ? AND folder_id IS ? AND is_deleted = 0
             ORDER BY created_at DESC, id DESC"
        );
        let files = sqlx::query_as::<_, DriveFile>(&sql)
            .bind(owner_id)
            .bind(folder_id)
            .fetch_all(self.pool)
            .await
            .map_err(|e| CumulusError::Database(e.to_string()))?;
        Ok(files)
    }

    /// Trashed files, most recently trashed first.
    pub async fn list_trashed(&self, owner_id: i64) -> Result<Vec<DriveFile>> {
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM files
             WHERE owner_id = ? AND is_deleted = 1
             ORDER BY deleted_at DESC, id DESC"
        );
        self.fetch_for_owner(&sql, owner_id).await
    }

    /// Starred, non-trashed files, most recently starred first.
    pub async fn list_starred(&self, owner_id: i64) -> Result<Vec<DriveFile>> {
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM files
             WHERE owner_id = ? AND is_starred = 1 AND is_deleted = 0
             ORDER BY starred_at DESC, id DESC"
        );
        self.fetch_for_owner(&sql, owner_id).await
    }

    /// Non-trashed files, most recently updated first.
    pub async fn list_recent(&self, owner_id: i64, limit: i64) -> Result<Vec<DriveFile>> {
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM files
             WHERE owner_id = ? AND is_deleted = 0
             ORDER BY updated_at DESC, id DESC
             LIMIT ?"
        );
        let files = sqlx::query_as::<_, DriveFile>(&sql)
            .bind(owner_id)
            .bind(limit)
            .fetch_all(self.pool)
            .await
            .map_err(|e| CumulusError::Database(e.to_string()))?;
        Ok(files)
    }

    /// Case-insensitive substring search over the owner's non-trashed files,
    /// most recently updated first.
    ///
    /// Matching happens in Rust so that non-ASCII names fold case correctly;
    /// SQLite's `LIKE` only folds ASCII.
    pub async fn search(&self, owner_id: i64, query: &str) -> Result<Vec<DriveFile>> {
        let needle = query.to_lowercase();
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM files
             WHERE owner_id = ? AND is_deleted = 0
             ORDER BY updated_at DESC, id DESC"
        );
        let files = self.fetch_for_owner(&sql, owner_id).await?;
        Ok(files
            .into_iter()
            .filter(|f| f.name.to_lowercase().contains(&needle))
            .collect())
    }

    /// Non-trashed files shared with `user_id`, with their owners.
    pub async fn list_shared_with(&self, user_id: i64) -> Result<Vec<OwnedFile>> {
        let sql = format!(
            "SELECT {}, u.name AS owner_name, u.email AS owner_email
             FROM files f
             JOIN file_shares s ON s.resource_id = f.id
             JOIN users u ON u.id = f.owner_id
             WHERE s.user_id = ? AND f.is_deleted = 0
             ORDER BY f.updated_at DESC, f.id DESC",
            qualified_columns("f")
        );
        let files = sqlx::query_as::<_, OwnedFile>(&sql)
            .bind(user_id)
            .fetch_all(self.pool)
            .await
            .map_err(|e| CumulusError::Database(e.to_string()))?;
        Ok(files)
    }

    /// Apply a partial update. Returns the updated file, or None if not found.
    pub async fn update(&self, id: i64, update: &FileUpdate) -> Result<Option<DriveFile>> {
        if update.is_empty() {
            return self.get_by_id(id).await;
        }

        let mut query: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new("UPDATE files SET ");
        let mut separated = query.separated(", ");

        if let Some(ref name) = update.name {
            separated.push("name = ");
            separated.push_bind_unseparated(name);
            separated.push("extension = ");
            separated.push_bind_unseparated(extension_of(name));
            separated.push("kind = ");
            separated.push_bind_unseparated(FileKind::from_extension(&extension_of(name)).as_str());
        }
        if let Some(folder_id) = update.folder_id {
            separated.push("folder_id = ");
            separated.push_bind_unseparated(folder_id);
        }
        if let Some(ref link) = update.public_link {
            separated.push("is_public = ");
            separated.push_bind_unseparated(link.is_some());
            separated.push("public_link = ");
            separated.push_bind_unseparated(link.clone());
        }
        separated.push("updated_at = ");
        separated.push_bind_unseparated(datetime::now());

        query.push(" WHERE id = ");
        query.push_bind(id);

        let result = query
            .build()
            .execute(self.pool)
            .await
            .map_err(|e| CumulusError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    /// Move an active file to the trash. Returns false unless it was active.
    pub async fn trash(&self, id: i64) -> Result<bool> {
        let now = datetime::now();
        let result = sqlx::query(
            "UPDATE files SET is_deleted = 1, deleted_at = ?, updated_at = ?
             WHERE id = ? AND is_deleted = 0",
        )
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(self.pool)
        .await
        .map_err(|e| CumulusError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    /// Restore a trashed file. Returns false unless it was trashed.
    pub async fn restore(&self, id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE files SET is_deleted = 0, deleted_at = NULL, updated_at = ?
             WHERE id = ? AND is_deleted = 1",
        )
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
            "UPDATE files
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

    /// Delete a file record.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| CumulusError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete the listed files of `owner_id` that are still trashed.
    pub async fn delete_trashed(&self, owner_id: i64, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut query: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("DELETE FROM files WHERE is_deleted = 1 AND owner_id = ");
        query.push_bind(owner_id);
        query.push(" AND id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let result = query
            .build()
            .execute(self.pool)
            .await
            .map_err(|e| CumulusError::Database(e.to_string()))?;
        Ok(result.rows_affected())
    }

    /// Byte totals for `owner_id`.
    pub async fn storage_totals(&self, owner_id: i64) -> Result<StorageTotals> {
        let totals = sqlx::query_as::<_, StorageTotals>(
            "SELECT COALESCE(SUM(size), 0) AS used,
                    COALESCE(SUM(CASE WHEN is_deleted = 1 THEN size ELSE 0 END), 0) AS trashed
             FROM files WHERE owner_id = ?",
        )
        .bind(owner_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| CumulusError::Database(e.to_string()))?;
        Ok(totals)
    }

    async fn fetch_for_owner(&self, sql: &str, owner_id: i64) -> Result<Vec<DriveFile>> {
        let files = sqlx::query_as::<_, DriveFile>(sql)
            .bind(owner_id)
            .fetch_all(self.pool)
            .await
            .map_err(|e| CumulusError::Database(e.to_string()))?;
        Ok(files)
    }
}

/// `FILE_COLUMNS` qualified with a table alias.
fn qualified_columns(alias: &str) -> String {
    FILE_COLUMNS
        .split(", ")
        .map(|c| format!("{alias}.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewUser, UserRepository};
    use crate::drive::{FolderRepository, NewFolder};
    use crate::Database;

    async fn setup() -> (Database, i64) {
        let db = Database::open_in_memory().await.unwrap();
        let user = UserRepository::new(db.pool())
            .create(&NewUser::new("Owner", "owner@example.com", "h", 1000))
            .await
            .unwrap();
        (db, user.id)
    }

    fn new_file(name: &str, size: i64, owner: i64) -> NewFile {
        NewFile::new(name, format!("http://objects/{name}"), format!("obj-{name}"), size, owner)
    }

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(FileKind::from_extension("jpeg"), FileKind::Image);
        assert_eq!(FileKind::from_extension("webp"), FileKind::Image);
        assert_eq!(FileKind::from_extension("mkv"), FileKind::Video);
        assert_eq!(FileKind::from_extension("pdf"), FileKind::Pdf);
        assert_eq!(FileKind::from_extension("docx"), FileKind::Other);
        assert_eq!(FileKind::from_extension(""), FileKind::Other);
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("Photo.JPG"), "jpg");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("README"), "");
        assert_eq!(extension_of(".bashrc"), "");
    }

    #[test]
    fn test_qualified_columns() {
        let cols = qualified_columns("f");
        assert!(cols.starts_with("f.id, f.name"));
        assert!(cols.ends_with("f.updated_at"));
    }

    #[tokio::test]
    async fn test_create_file_classifies() {
        let (db, owner) = setup().await;
        let repo = FileRepository::new(db.pool());

        let file = repo.create(&new_file("Scan.PDF", 10, owner)).await.unwrap();
        assert_eq!(file.kind, FileKind::Pdf);
        assert_eq!(file.extension, "pdf");
        assert!(file.folder_id.is_none());
        assert!(!file.is_deleted);
    }

    #[tokio::test]
    async fn test_list_in_folder_excludes_trashed() {
        let (db, owner) = setup().await;
        let folder = FolderRepository::new(db.pool())
            .create(&NewFolder::root("Docs", owner))
            .await
            .unwrap();
        let repo = FileRepository::new(db.pool());

        let a = repo
            .create(&new_file("a.txt", 1, owner).in_folder(Some(folder.id)))
            .await
            .unwrap();
        let b = repo
            .create(&new_file("b.txt", 1, owner).in_folder(Some(folder.id)))
            .await
            .unwrap();
        repo.create(&new_file("root.txt", 1, owner)).await.unwrap();

        assert!(repo.trash(a.id).await.unwrap());
        let listed = repo.list_in_folder(owner, Some(folder.id)).await.unwrap();
        assert_eq!(listed.iter().map(|f| f.id).collect::<Vec<_>>(), vec![b.id]);

        let root = repo.list_in_folder(owner, None).await.unwrap();
        assert_eq!(root.len(), 1);
        assert_eq!(root[0].name, "root.txt");
    }

    #[tokio::test]
    async fn test_trash_restore_state_machine() {
        let (db, owner) = setup().await;
        let repo = FileRepository::new(db.pool());
        let file = repo.create(&new_file("a.txt", 1, owner)).await.unwrap();

        assert!(!repo.restore(file.id).await.unwrap());
        assert!(repo.trash(file.id).await.unwrap());
        assert!(!repo.trash(file.id).await.unwrap());

        let trashed = repo.get_by_id(file.id).await.unwrap().unwrap();
        assert!(trashed.is_deleted);
        assert!(trashed.deleted_at.is_some());

        assert!(repo.restore(file.id).await.unwrap());
        let restored = repo.get_by_id(file.id).await.unwrap().unwrap();
        assert!(!restored.is_deleted);
        assert!(restored.deleted_at.is_none());
    }

    #[tokio::test]
    async fn test_update_rename_reclassifies() {
        let (db, owner) = setup().await;
        let repo = FileRepository::new(db.pool());
        let file = repo.create(&new_file("clip.txt", 1, owner)).await.unwrap();

        let updated = repo
            .update(file.id, &FileUpdate::new().name("clip.mp4"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "clip.mp4");
        assert_eq!(updated.kind, FileKind::Video);
        assert!(updated.updated_at >= file.updated_at);
    }

    #[tokio::test]
    async fn test_update_public_link() {
        let (db, owner) = setup().await;
        let repo = FileRepository::new(db.pool());
        let file = repo.create(&new_file("a.txt", 1, owner)).await.unwrap();

        let public = repo
            .update(file.id, &FileUpdate::new().public_link(Some("http://x/shared/file/1".into())))
            .await
            .unwrap()
            .unwrap();
        assert!(public.is_public);
        assert!(repo.get_public(file.id).await.unwrap().is_some());

        let private = repo
            .update(file.id, &FileUpdate::new().public_link(None))
            .await
            .unwrap()
            .unwrap();
        assert!(!private.is_public);
        assert!(private.public_link.is_none());
        assert!(repo.get_public(file.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive() {
        let (db, owner) = setup().await;
        let repo = FileRepository::new(db.pool());
        repo.create(&new_file("Quarterly Report.pdf", 1, owner)).await.unwrap();
        repo.create(&new_file("ÉTÉ photo.jpg", 1, owner)).await.unwrap();
        repo.create(&new_file("notes.txt", 1, owner)).await.unwrap();

        assert_eq!(repo.search(owner, "REPORT").await.unwrap().len(), 1);
        assert_eq!(repo.search(owner, "été").await.unwrap().len(), 1);
        assert_eq!(repo.search(owner, "%").await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_storage_totals() {
        let (db, owner) = setup().await;
        let repo = FileRepository::new(db.pool());
        repo.create(&new_file("a", 100, owner)).await.unwrap();
        let b = repo.create(&new_file("b", 40, owner)).await.unwrap();
        repo.trash(b.id).await.unwrap();

        let totals = repo.storage_totals(owner).await.unwrap();
        assert_eq!(totals, StorageTotals { used: 140, trashed: 40 });
        assert_eq!(repo.storage_totals(999).await.unwrap(), StorageTotals::default());
    }

    #[tokio::test]
    async fn test_delete_trashed_only_listed() {
        let (db, owner) = setup().await;
        let repo = FileRepository::new(db.pool());
        let a = repo.create(&new_file("a", 1, owner)).await.unwrap();
        let b = repo.create(&new_file("b", 1, owner)).await.unwrap();
        repo.trash(a.id).await.unwrap();

        assert_eq!(repo.delete_trashed(owner, &[a.id, b.id]).await.unwrap(), 1);
        assert!(repo.get_by_id(a.id).await.unwrap().is_none());
        assert!(repo.get_by_id(b.id).await.unwrap().is_some());
        assert_eq!(repo.delete_trashed(owner, &[]).await.unwrap(), 0);
    }
}
