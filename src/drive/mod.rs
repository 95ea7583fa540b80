//! Drive domain: folders, files, sharing and object storage.
//!
//! This module provides:
//! - Nested folders with a materialized ancestor path
//! - File records with a trash/star lifecycle
//! - Owner / shared / public access resolution
//! - Pluggable object storage (local filesystem or Cloudinary)
//! - Per-owner storage accounting

mod access;
mod cloudinary;
mod file;
mod file_service;
mod folder;
mod folder_service;
mod share;
mod storage;
mod validation;

pub use access::{
    identity_access, require_read, require_write, resolve_access, AccessLevel, Permission,
    Shareable,
};
pub use cloudinary::CloudinaryStore;
pub use file::{
    extension_of, DriveFile, FileKind, FileRepository, FileUpdate, NewFile, OwnedFile,
    StorageTotals,
};
pub use file_service::{DownloadInfo, FileService, StorageUsage, UploadRequest};
pub use folder::{Folder, FolderNode, FolderPath, FolderRepository, NewFolder, SubtreeDeletion};
pub use folder_service::{DeleteSummary, FolderContents, FolderService};
pub use share::{ResourceKind, ShareEntry, ShareRepository, ShareTarget};
pub use storage::{
    build_store, destroy_best_effort, LocalObjectStore, ObjectStore, StoredObject,
};
pub use validation::{valid_name, validate_name, FORBIDDEN_NAME_CHARS};

use crate::config::Config;

/// Maximum length for file and folder names (in characters).
pub const MAX_NAME_LENGTH: usize = 255;

/// Limits and links used by the drive services.
#[derive(Debug, Clone)]
pub struct DriveSettings {
    /// Maximum number of ancestors a folder may have.
    pub max_folder_depth: usize,
    /// Maximum number of folders removed by one recursive delete.
    pub max_delete_batch: usize,
    /// Number of entries in the recent-files listing.
    pub recent_limit: i64,
    /// Base URL of the web client, used to build public links.
    pub client_url: String,
}

impl DriveSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_folder_depth: config.drive.max_folder_depth,
            max_delete_batch: config.drive.max_delete_batch,
            recent_limit: config.drive.recent_limit,
            client_url: config.server.client_url.trim_end_matches('/').to_string(),
        }
    }

    /// Public link shown to the owner for a shared entity.
    pub fn public_link(&self, kind: ResourceKind, id: i64) -> String {
        format!("{}/shared/{}/{id}", self.client_url, kind.as_str())
    }
}

impl Default for DriveSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
