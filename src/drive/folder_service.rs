//! Folder operations with ownership, access and hierarchy checks.

use tracing::info;

use super::access::{require_read, require_write, Permission};
use super::file::{DriveFile, FileRepository};
use super::folder::{check_depth, Folder, FolderRepository, NewFolder};
use super::share::{ResourceKind, ShareRepository, ShareTarget};
use super::storage::{destroy_best_effort, ObjectStore};
use super::validation::validate_name;
use super::DriveSettings;
use crate::db::Database;
use crate::{CumulusError, Result};

/// One level of a folder listing.
#[derive(Debug, Clone)]
pub struct FolderContents {
    /// The listed folder, `None` for the requester's root.
    pub folder: Option<Folder>,
    pub folders: Vec<Folder>,
    pub files: Vec<DriveFile>,
}

/// Outcome of a recursive folder delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteSummary {
    pub folders: u64,
    pub files: u64,
    /// Stored objects whose removal failed and were left behind.
    pub orphaned_objects: usize,
}

/// Folder service.
pub struct FolderService<'a> {
    db: &'a Database,
    store: &'a dyn ObjectStore,
    settings: &'a DriveSettings,
}

impl<'a> FolderService<'a> {
    pub fn new(db: &'a Database, store: &'a dyn ObjectStore, settings: &'a DriveSettings) -> Self {
        Self { db, store, settings }
    }

    fn folders(&self) -> FolderRepository<'_> {
        FolderRepository::new(self.db.pool())
    }

    fn shares(&self) -> ShareRepository<'_> {
        ShareRepository::new(self.db.pool(), ResourceKind::Folder)
    }

    /// Folder owned by `owner_id`, or NotFound.
    async fn owned(&self, id: i64, owner_id: i64) -> Result<Folder> {
        self.folders()
            .get_owned(id, owner_id)
            .await?
            .ok_or_else(|| CumulusError::NotFound("folder".to_string()))
    }

    async fn existing(&self, id: i64) -> Result<Folder> {
        self.folders()
            .get_by_id(id)
            .await?
            .ok_or_else(|| CumulusError::NotFound("folder".to_string()))
    }

    /// Create a folder at the root or under a parent the owner holds.
    pub async fn create(&self, owner_id: i64, name: &str, parent_id: Option<i64>) -> Result<Folder> {
        let name = validate_name(name)?;

        let new_folder = match parent_id {
            Some(parent_id) => {
                let parent = self.owned(parent_id, owner_id).await?;
                NewFolder::under(name, &parent)
            }
            None => NewFolder::root(name, owner_id),
        };
        check_depth(new_folder.path.depth(), self.settings.max_folder_depth)?;

        let folder = self.folders().create(&new_folder).await?;
        info!(folder_id = folder.id, owner_id, "Folder created");
        Ok(folder)
    }

    /// Direct children of `parent_id` owned by `owner_id`.
    pub async fn list(&self, owner_id: i64, parent_id: Option<i64>) -> Result<Vec<Folder>> {
        self.folders().list_children(owner_id, parent_id).await
    }

    /// One level of folders and non-trashed files.
    ///
    /// The root listing is scoped to the requester. A folder listing needs
    /// read access and shows the folder owner's children.
    pub async fn contents(&self, requester: i64, folder_id: Option<i64>) -> Result<FolderContents> {
        let files = FileRepository::new(self.db.pool());

        match folder_id {
            None => Ok(FolderContents {
                folder: None,
                folders: self.folders().list_children(requester, None).await?,
                files: files.list_in_folder(requester, None).await?,
            }),
            Some(id) => {
                let folder = self.existing(id).await?;
                require_read(&folder, Some(requester))?;

                let folders = self
                    .folders()
                    .list_children(folder.owner_id, Some(folder.id))
                    .await?;
                let children = files.list_in_folder(folder.owner_id, Some(folder.id)).await?;
                Ok(FolderContents {
                    folder: Some(folder),
                    folders,
                    files: children,
                })
            }
        }
    }

    /// A single folder, visible to its owner, share targets, or anyone when public.
    pub async fn get(&self, requester: Option<i64>, id: i64) -> Result<Folder> {
        let folder = self.existing(id).await?;
        require_read(&folder, requester)?;
        Ok(folder)
    }

    /// Ancestors of a folder followed by the folder itself.
    pub async fn breadcrumbs(&self, requester: i64, id: i64) -> Result<Vec<Folder>> {
        let folder = self.existing(id).await?;
        require_read(&folder, Some(requester))?;

        let mut crumbs = self.folders().list_ancestors(&folder.path).await?;
        crumbs.push(folder);
        Ok(crumbs)
    }

    /// Rename a folder. Owners and editors may rename.
    pub async fn rename(&self, requester: i64, id: i64, name: &str) -> Result<Folder> {
        let name = validate_name(name)?;
        let folder = self.existing(id).await?;
        require_write(&folder, requester)?;

        self.folders().rename(folder.id, &name).await?;
        self.existing(id).await
    }

    /// Move a folder under `dest_id` (root when `None`).
    ///
    /// The destination must be owned by the requester and must not be the
    /// folder itself or one of its descendants. The whole subtree keeps a
    /// valid path.
    pub async fn move_to(&self, owner_id: i64, id: i64, dest_id: Option<i64>) -> Result<Folder> {
        self.owned(id, owner_id).await?;
        if let Some(dest_id) = dest_id {
            self.owned(dest_id, owner_id).await?;
        }

        let rewritten = self
            .folders()
            .move_subtree(id, dest_id, self.settings.max_folder_depth)
            .await?;
        info!(folder_id = id, descendants = rewritten, "Folder moved");
        self.existing(id).await
    }

    /// Recursively delete a folder, its descendants and every file inside.
    ///
    /// Stored objects are destroyed once the records are gone; failures are
    /// counted in [`DeleteSummary::orphaned_objects`].
    pub async fn delete(&self, owner_id: i64, id: i64) -> Result<DeleteSummary> {
        self.owned(id, owner_id).await?;

        let deleted = self
            .folders()
            .delete_subtree(id, self.settings.max_delete_batch)
            .await?;
        let orphaned_objects = destroy_best_effort(self.store, &deleted.object_ids).await;

        info!(
            folder_id = id,
            folders = deleted.folders,
            files = deleted.files,
            "Folder tree deleted"
        );
        Ok(DeleteSummary {
            folders: deleted.folders,
            files: deleted.files,
            orphaned_objects,
        })
    }

    /// Add or update a share entry.
    pub async fn share(
        &self,
        owner_id: i64,
        id: i64,
        target: &ShareTarget,
        permission: Permission,
    ) -> Result<Folder> {
        let folder = self.owned(id, owner_id).await?;
        let user = target.resolve(self.db.pool(), owner_id).await?;

        self.shares().upsert(folder.id, user.id, permission).await?;
        info!(folder_id = id, user_id = user.id, %permission, "Folder shared");
        self.existing(id).await
    }

    /// Remove a share entry.
    pub async fn unshare(&self, owner_id: i64, id: i64, user_id: i64) -> Result<Folder> {
        let folder = self.owned(id, owner_id).await?;
        if !self.shares().remove(folder.id, user_id).await? {
            return Err(CumulusError::NotFound("share entry".to_string()));
        }
        self.existing(id).await
    }

    /// Make a folder public and return it with its link.
    pub async fn publish(&self, owner_id: i64, id: i64) -> Result<Folder> {
        let folder = self.owned(id, owner_id).await?;
        let link = self.settings.public_link(ResourceKind::Folder, folder.id);
        self.folders().set_public_link(folder.id, Some(&link)).await?;
        self.existing(id).await
    }

    /// Revoke a folder's public link.
    pub async fn unpublish(&self, owner_id: i64, id: i64) -> Result<Folder> {
        let folder = self.owned(id, owner_id).await?;
        self.folders().set_public_link(folder.id, None).await?;
        self.existing(id).await
    }

    /// Flip the star flag.
    pub async fn toggle_star(&self, owner_id: i64, id: i64) -> Result<Folder> {
        let folder = self.owned(id, owner_id).await?;
        self.folders().toggle_star(folder.id).await?;
        self.existing(id).await
    }

    pub async fn starred(&self, owner_id: i64) -> Result<Vec<Folder>> {
        self.folders().list_starred(owner_id).await
    }

    /// Folders other users shared with `user_id`.
    pub async fn shared_with(&self, user_id: i64) -> Result<Vec<Folder>> {
        self.folders().list_shared_with(user_id).await
    }
}
