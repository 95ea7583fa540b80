//! File operations: upload, lifecycle, sharing and storage accounting.

use tracing::{info, warn};

use super::access::{require_read, require_write, Permission};
use super::file::{DriveFile, FileKind, FileRepository, FileUpdate, NewFile, OwnedFile};
use super::folder::FolderRepository;
use super::share::{ResourceKind, ShareRepository, ShareTarget};
use super::storage::{destroy_best_effort, ObjectStore};
use super::validation::validate_name;
use super::DriveSettings;
use crate::db::{Database, UserRepository};
use crate::{CumulusError, Result};

/// Request data for a file upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Original filename.
    pub filename: String,
    /// Target folder, root when `None`.
    pub folder_id: Option<i64>,
    pub content: Vec<u8>,
}

impl UploadRequest {
    pub fn new(filename: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            folder_id: None,
            content,
        }
    }

    pub fn in_folder(mut self, folder_id: Option<i64>) -> Self {
        self.folder_id = folder_id;
        self
    }
}

/// What a client needs to fetch a file's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadInfo {
    pub url: String,
    pub filename: String,
    pub kind: FileKind,
}

impl From<&DriveFile> for DownloadInfo {
    fn from(file: &DriveFile) -> Self {
        Self {
            url: file.url.clone(),
            filename: file.name.clone(),
            kind: file.kind,
        }
    }
}

/// Storage usage of one owner, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageUsage {
    /// All files, trashed included.
    pub used: i64,
    pub limit: i64,
    /// Trashed files only.
    pub trashed: i64,
    /// `limit - used`, never negative.
    pub available: i64,
}

/// File service.
pub struct FileService<'a> {
    db: &'a Database,
    store: &'a dyn ObjectStore,
    settings: &'a DriveSettings,
}

impl<'a> FileService<'a> {
    pub fn new(db: &'a Database, store: &'a dyn ObjectStore, settings: &'a DriveSettings) -> Self {
        Self { db, store, settings }
    }

    fn files(&self) -> FileRepository<'_> {
        FileRepository::new(self.db.pool())
    }

    fn shares(&self) -> ShareRepository<'_> {
        ShareRepository::new(self.db.pool(), ResourceKind::File)
    }

    async fn existing(&self, id: i64) -> Result<DriveFile> {
        self.files()
            .get_by_id(id)
            .await?
            .ok_or_else(|| CumulusError::NotFound("file".to_string()))
    }

    /// File owned by `owner_id` in any trash state, or NotFound.
    async fn owned(&self, id: i64, owner_id: i64) -> Result<DriveFile> {
        self.files()
            .get_owned(id, owner_id)
            .await?
            .ok_or_else(|| CumulusError::NotFound("file".to_string()))
    }

    /// Non-trashed file owned by `owner_id`, or NotFound.
    async fn owned_active(&self, id: i64, owner_id: i64) -> Result<DriveFile> {
        let file = self.owned(id, owner_id).await?;
        if file.is_deleted {
            return Err(CumulusError::NotFound("file".to_string()));
        }
        Ok(file)
    }

    /// Trashed file owned by `owner_id`, or NotFound.
    async fn owned_trashed(&self, id: i64, owner_id: i64) -> Result<DriveFile> {
        let file = self.owned(id, owner_id).await?;
        if !file.is_deleted {
            return Err(CumulusError::NotFound("file in trash".to_string()));
        }
        Ok(file)
    }

    async fn check_folder(&self, owner_id: i64, folder_id: Option<i64>) -> Result<()> {
        if let Some(folder_id) = folder_id {
            FolderRepository::new(self.db.pool())
                .get_owned(folder_id, owner_id)
                .await?
                .ok_or_else(|| CumulusError::NotFound("folder".to_string()))?;
        }
        Ok(())
    }

    /// Store the content and record the file.
    ///
    /// Rejects with `QuotaExceeded` when the owner's usage plus the upload
    /// would pass their limit. The check and the insert are not atomic.
    pub async fn upload(&self, owner_id: i64, request: UploadRequest) -> Result<DriveFile> {
        let name = validate_name(&request.filename)?;
        self.check_folder(owner_id, request.folder_id).await?;

        let size = request.content.len() as i64;
        let usage = self.usage(owner_id).await?;
        if usage.used + size > usage.limit {
            return Err(CumulusError::QuotaExceeded(format!(
                "{size} bytes requested, {} bytes available",
                usage.available
            )));
        }

        let stored = self.store.upload(request.content, &name).await?;
        let new_file = NewFile::new(name, &stored.url, &stored.object_id, size, owner_id)
            .in_folder(request.folder_id);

        match self.files().create(&new_file).await {
            Ok(file) => {
                info!(file_id = file.id, owner_id, size, "File uploaded");
                Ok(file)
            }
            Err(e) => {
                if let Err(destroy_err) = self.store.destroy(&stored.object_id).await {
                    warn!(object_id = %stored.object_id, "Failed to remove orphaned object: {}", destroy_err);
                }
                Err(e)
            }
        }
    }

    /// Non-trashed files directly in `folder_id` (root when `None`).
    pub async fn list(&self, owner_id: i64, folder_id: Option<i64>) -> Result<Vec<DriveFile>> {
        self.files().list_in_folder(owner_id, folder_id).await
    }

    /// A single file, in any trash state, if `requester` may read it.
    pub async fn get(&self, requester: Option<i64>, id: i64) -> Result<DriveFile> {
        let file = self.existing(id).await?;
        require_read(&file, requester)?;
        Ok(file)
    }

    /// Download descriptor for a file `requester` may read.
    ///
    /// Trashed files can only be downloaded by their owner; everyone else
    /// gets NotFound, as with the public download.
    pub async fn download(&self, requester: i64, id: i64) -> Result<DownloadInfo> {
        let file = self.existing(id).await?;
        if file.is_deleted && file.owner_id != requester {
            return Err(CumulusError::NotFound("file".to_string()));
        }
        require_read(&file, Some(requester))?;
        Ok(DownloadInfo::from(&file))
    }

    /// A public, non-trashed file with its owner's identity.
    pub async fn get_public(&self, id: i64) -> Result<OwnedFile> {
        self.files()
            .get_public(id)
            .await?
            .ok_or_else(|| CumulusError::NotFound("public file".to_string()))
    }

    pub async fn public_download(&self, id: i64) -> Result<DownloadInfo> {
        let public = self.get_public(id).await?;
        Ok(DownloadInfo::from(&public.file))
    }

    /// Rename a file. Owners and editors may rename.
    pub async fn rename(&self, requester: i64, id: i64, name: &str) -> Result<DriveFile> {
        let name = validate_name(name)?;
        let file = self.existing(id).await?;
        require_write(&file, requester)?;

        self.update(file.id, FileUpdate::new().name(name)).await
    }

    /// Move a file into `folder_id` (root when `None`).
    pub async fn move_to(&self, owner_id: i64, id: i64, folder_id: Option<i64>) -> Result<DriveFile> {
        let file = self.owned(id, owner_id).await?;
        self.check_folder(owner_id, folder_id).await?;

        self.update(file.id, FileUpdate::new().folder(folder_id)).await
    }

    async fn update(&self, id: i64, update: FileUpdate) -> Result<DriveFile> {
        self.files()
            .update(id, &update)
            .await?
            .ok_or_else(|| CumulusError::NotFound("file".to_string()))
    }

    /// Move an active file to the trash.
    pub async fn trash(&self, owner_id: i64, id: i64) -> Result<DriveFile> {
        let file = self.owned_active(id, owner_id).await?;
        self.files().trash(file.id).await?;
        self.existing(id).await
    }

    /// Bring a trashed file back.
    pub async fn restore(&self, owner_id: i64, id: i64) -> Result<DriveFile> {
        let file = self.owned_trashed(id, owner_id).await?;
        self.files().restore(file.id).await?;
        self.existing(id).await
    }

    /// Permanently delete a trashed file.
    ///
    /// The stored object is destroyed best-effort; the record is removed even
    /// when that fails.
    pub async fn purge(&self, owner_id: i64, id: i64) -> Result<()> {
        let file = self.owned_trashed(id, owner_id).await?;

        if let Err(e) = self.store.destroy(&file.object_id).await {
            warn!(
                file_id = file.id,
                backend = self.store.backend_name(),
                "Failed to destroy stored object, removing record anyway: {}",
                e
            );
        }
        self.files().delete(file.id).await?;
        info!(file_id = id, owner_id, "File permanently deleted");
        Ok(())
    }

    /// Permanently delete every trashed file of `owner_id`. Returns the count.
    pub async fn empty_trash(&self, owner_id: i64) -> Result<u64> {
        let trashed = self.files().list_trashed(owner_id).await?;
        if trashed.is_empty() {
            return Ok(0);
        }

        let object_ids: Vec<String> = trashed.iter().map(|f| f.object_id.clone()).collect();
        destroy_best_effort(self.store, &object_ids).await;

        let ids: Vec<i64> = trashed.iter().map(|f| f.id).collect();
        let deleted = self.files().delete_trashed(owner_id, &ids).await?;
        info!(owner_id, deleted, "Trash emptied");
        Ok(deleted)
    }

    pub async fn trashed(&self, owner_id: i64) -> Result<Vec<DriveFile>> {
        self.files().list_trashed(owner_id).await
    }

    /// Flip the star flag. Allowed in any trash state.
    pub async fn toggle_star(&self, owner_id: i64, id: i64) -> Result<DriveFile> {
        let file = self.owned(id, owner_id).await?;
        self.files().toggle_star(file.id).await?;
        self.existing(id).await
    }

    pub async fn starred(&self, owner_id: i64) -> Result<Vec<DriveFile>> {
        self.files().list_starred(owner_id).await
    }

    pub async fn recent(&self, owner_id: i64) -> Result<Vec<DriveFile>> {
        self.files()
            .list_recent(owner_id, self.settings.recent_limit)
            .await
    }

    /// Case-insensitive substring search over the owner's non-trashed files.
    pub async fn search(&self, owner_id: i64, query: &str) -> Result<Vec<DriveFile>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CumulusError::Validation("Search query is required".to_string()));
        }
        self.files().search(owner_id, query).await
    }

    pub async fn shared_with(&self, user_id: i64) -> Result<Vec<OwnedFile>> {
        self.files().list_shared_with(user_id).await
    }

    /// Add or update a share entry.
    pub async fn share(
        &self,
        owner_id: i64,
        id: i64,
        target: &ShareTarget,
        permission: Permission,
    ) -> Result<DriveFile> {
        let file = self.owned(id, owner_id).await?;
        let user = target.resolve(self.db.pool(), owner_id).await?;

        self.shares().upsert(file.id, user.id, permission).await?;
        info!(file_id = id, user_id = user.id, %permission, "File shared");
        self.existing(id).await
    }

    /// Remove a share entry.
    pub async fn unshare(&self, owner_id: i64, id: i64, user_id: i64) -> Result<DriveFile> {
        let file = self.owned(id, owner_id).await?;
        if !self.shares().remove(file.id, user_id).await? {
            return Err(CumulusError::NotFound("share entry".to_string()));
        }
        self.existing(id).await
    }

    /// Make a file public and return it with its link.
    pub async fn publish(&self, owner_id: i64, id: i64) -> Result<DriveFile> {
        let file = self.owned(id, owner_id).await?;
        let link = self.settings.public_link(ResourceKind::File, file.id);
        self.update(file.id, FileUpdate::new().public_link(Some(link)))
            .await
    }

    /// Revoke a file's public link.
    pub async fn unpublish(&self, owner_id: i64, id: i64) -> Result<DriveFile> {
        let file = self.owned(id, owner_id).await?;
        self.update(file.id, FileUpdate::new().public_link(None)).await
    }

    /// Usage of `owner_id` against their quota.
    pub async fn usage(&self, owner_id: i64) -> Result<StorageUsage> {
        let user = UserRepository::new(self.db.pool())
            .get_by_id(owner_id)
            .await?
            .ok_or_else(|| CumulusError::NotFound("user".to_string()))?;
        let totals = self.files().storage_totals(owner_id).await?;

        Ok(StorageUsage {
            used: totals.used,
            limit: user.storage_limit,
            trashed: totals.trashed,
            available: (user.storage_limit - totals.used).max(0),
        })
    }
}
