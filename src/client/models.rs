//! Response payloads as seen by the client.

use serde::Deserialize;

/// The `{"data": ...}` envelope of successful responses.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub storage_limit: i64,
}

/// Result of login or registration.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub expires_in: u64,
    pub user: UserInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RefreshedToken {
    pub access_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileInfo {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub size: i64,
    /// `image`, `video`, `pdf` or `other`.
    pub kind: String,
    pub owner_id: i64,
    pub folder_id: Option<i64>,
    pub is_public: bool,
    #[serde(default)]
    pub public_link: Option<String>,
    pub is_deleted: bool,
    pub is_starred: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FolderInfo {
    pub id: i64,
    pub name: String,
    pub owner_id: i64,
    pub parent_id: Option<i64>,
    pub path: Vec<i64>,
    pub is_public: bool,
    #[serde(default)]
    pub public_link: Option<String>,
    pub is_starred: bool,
}

/// Mutation acknowledgements carry the updated entity.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FileAction {
    pub file: FileInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FolderAction {
    pub folder: FolderInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Contents {
    pub folder: Option<FolderInfo>,
    pub folders: Vec<FolderInfo>,
    pub files: Vec<FileInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadLink {
    pub url: String,
    pub filename: String,
    pub kind: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Usage {
    pub used: i64,
    pub limit: i64,
    pub trashed: i64,
    pub available: i64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FolderDeletion {
    pub deleted_folders: u64,
    pub deleted_files: u64,
}
