//! Response DTOs for the Web API.

use serde::Serialize;

use crate::datetime::{opt_to_rfc3339, to_rfc3339};
use crate::db::User;
use crate::drive::{
    DownloadInfo, DriveFile, FileKind, Folder, FolderContents, OwnedFile, Permission, ShareEntry,
    StorageUsage,
};

// ============================================================================
// Generic Response Wrappers
// ============================================================================

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Plain confirmation message.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ============================================================================
// Auth DTOs
// ============================================================================

/// Public view of a user account.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// Quota in bytes.
    pub storage_limit: i64,
    pub created_at: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            storage_limit: user.storage_limit,
            created_at: to_rfc3339(&user.created_at),
        }
    }
}

/// Register / login response. The refresh token travels in a cookie.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    /// Access token (JWT).
    pub access_token: String,
    /// Access token expiry in seconds.
    pub expires_in: u64,
    pub user: UserResponse,
}

/// Token refresh response.
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    /// New access token.
    pub access_token: String,
    /// Expiry in seconds.
    pub expires_in: u64,
}

// ============================================================================
// Drive DTOs
// ============================================================================

/// One share list entry.
#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub permission: Permission,
}

impl From<&ShareEntry> for ShareResponse {
    fn from(entry: &ShareEntry) -> Self {
        Self {
            user_id: entry.user_id,
            name: entry.name.clone(),
            email: entry.email.clone(),
            permission: entry.permission,
        }
    }
}

/// Folder view.
#[derive(Debug, Serialize)]
pub struct FolderResponse {
    pub id: i64,
    pub name: String,
    pub owner_id: i64,
    pub parent_id: Option<i64>,
    /// Ancestor ids, root first.
    pub path: Vec<i64>,
    pub is_public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_link: Option<String>,
    pub is_starred: bool,
    pub starred_at: Option<String>,
    pub shared_with: Vec<ShareResponse>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Folder> for FolderResponse {
    fn from(folder: &Folder) -> Self {
        Self {
            id: folder.id,
            name: folder.name.clone(),
            owner_id: folder.owner_id,
            parent_id: folder.parent_id,
            path: folder.path.ids().to_vec(),
            is_public: folder.is_public,
            public_link: folder.public_link.clone(),
            is_starred: folder.is_starred,
            starred_at: opt_to_rfc3339(folder.starred_at.as_deref()),
            shared_with: folder.shared_with.iter().map(ShareResponse::from).collect(),
            created_at: to_rfc3339(&folder.created_at),
            updated_at: to_rfc3339(&folder.updated_at),
        }
    }
}

impl From<Folder> for FolderResponse {
    fn from(folder: Folder) -> Self {
        Self::from(&folder)
    }
}

/// File view.
#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub size: i64,
    pub kind: FileKind,
    pub extension: String,
    pub owner_id: i64,
    pub folder_id: Option<i64>,
    pub is_public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_link: Option<String>,
    pub is_deleted: bool,
    pub deleted_at: Option<String>,
    pub is_starred: bool,
    pub starred_at: Option<String>,
    pub shared_with: Vec<ShareResponse>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&DriveFile> for FileResponse {
    fn from(file: &DriveFile) -> Self {
        Self {
            id: file.id,
            name: file.name.clone(),
            url: file.url.clone(),
            size: file.size,
            kind: file.kind,
            extension: file.extension.clone(),
            owner_id: file.owner_id,
            folder_id: file.folder_id,
            is_public: file.is_public,
            public_link: file.public_link.clone(),
            is_deleted: file.is_deleted,
            deleted_at: opt_to_rfc3339(file.deleted_at.as_deref()),
            is_starred: file.is_starred,
            starred_at: opt_to_rfc3339(file.starred_at.as_deref()),
            shared_with: file.shared_with.iter().map(ShareResponse::from).collect(),
            created_at: to_rfc3339(&file.created_at),
            updated_at: to_rfc3339(&file.updated_at),
        }
    }
}

impl From<DriveFile> for FileResponse {
    fn from(file: DriveFile) -> Self {
        Self::from(&file)
    }
}

/// Owner identity attached to shared and public file views.
#[derive(Debug, Serialize)]
pub struct OwnerInfo {
    pub id: i64,
    pub name: String,
    pub email: String,
}

/// File view with its owner.
#[derive(Debug, Serialize)]
pub struct OwnedFileResponse {
    #[serde(flatten)]
    pub file: FileResponse,
    pub owner: OwnerInfo,
}

impl From<OwnedFile> for OwnedFileResponse {
    fn from(owned: OwnedFile) -> Self {
        Self {
            owner: OwnerInfo {
                id: owned.file.owner_id,
                name: owned.owner_name,
                email: owned.owner_email,
            },
            file: FileResponse::from(&owned.file),
        }
    }
}

/// A file mutation acknowledged with a message.
#[derive(Debug, Serialize)]
pub struct FileActionResponse {
    pub message: String,
    pub file: FileResponse,
}

impl FileActionResponse {
    pub fn new(message: impl Into<String>, file: &DriveFile) -> Self {
        Self {
            message: message.into(),
            file: FileResponse::from(file),
        }
    }
}

/// A folder mutation acknowledged with a message.
#[derive(Debug, Serialize)]
pub struct FolderActionResponse {
    pub message: String,
    pub folder: FolderResponse,
}

impl FolderActionResponse {
    pub fn new(message: impl Into<String>, folder: &Folder) -> Self {
        Self {
            message: message.into(),
            folder: FolderResponse::from(folder),
        }
    }
}

/// One level of a folder listing.
#[derive(Debug, Serialize)]
pub struct ContentsResponse {
    /// `None` for the root.
    pub folder: Option<FolderResponse>,
    pub folders: Vec<FolderResponse>,
    pub files: Vec<FileResponse>,
}

impl From<FolderContents> for ContentsResponse {
    fn from(contents: FolderContents) -> Self {
        Self {
            folder: contents.folder.map(FolderResponse::from),
            folders: contents.folders.into_iter().map(FolderResponse::from).collect(),
            files: contents.files.into_iter().map(FileResponse::from).collect(),
        }
    }
}

/// Result of a recursive folder delete.
#[derive(Debug, Serialize)]
pub struct FolderDeleteResponse {
    pub message: String,
    pub deleted_folders: u64,
    pub deleted_files: u64,
}

/// Result of emptying the trash.
#[derive(Debug, Serialize)]
pub struct EmptyTrashResponse {
    pub message: String,
    pub deleted: u64,
}

/// Download descriptor; the client fetches `url` itself.
#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub url: String,
    pub filename: String,
    pub kind: FileKind,
}

impl From<DownloadInfo> for DownloadResponse {
    fn from(info: DownloadInfo) -> Self {
        Self {
            url: info.url,
            filename: info.filename,
            kind: info.kind,
        }
    }
}

/// Storage usage in bytes.
#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub used: i64,
    pub limit: i64,
    pub trashed: i64,
    pub available: i64,
}

impl From<StorageUsage> for UsageResponse {
    fn from(usage: StorageUsage) -> Self {
        Self {
            used: usage.used,
            limit: usage.limit,
            trashed: usage.trashed,
            available: usage.available,
        }
    }
}
