//! Request DTOs for the Web API.

use serde::Deserialize;
use validator::Validate;

use super::validation::not_empty_trimmed;
use crate::drive::{valid_name, Permission};
use crate::web::error::ApiError;

/// User registration request.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(
        length(min = 1, max = 100, message = "Name must be 1-100 characters"),
        custom(function = "not_empty_trimmed")
    )]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, max = 128, message = "Password must be 6-128 characters"))]
    pub password: String,
}

/// Login request.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Folder creation request.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateFolderRequest {
    #[validate(custom(function = "valid_name"))]
    pub name: String,
    /// Parent folder, root when absent.
    #[serde(default)]
    pub parent_id: Option<i64>,
}

/// Rename request for files and folders.
#[derive(Debug, Deserialize, Validate)]
pub struct RenameRequest {
    #[validate(custom(function = "valid_name"))]
    pub name: String,
}

/// File move request. A null `folder_id` moves the file to the root.
#[derive(Debug, Deserialize)]
pub struct MoveFileRequest {
    #[serde(default)]
    pub folder_id: Option<i64>,
}

/// Folder move request. A null `parent_id` moves the folder to the root.
#[derive(Debug, Deserialize)]
pub struct MoveFolderRequest {
    #[serde(default)]
    pub parent_id: Option<i64>,
}

/// Share request; the target is named by id or by email.
#[derive(Debug, Deserialize, Validate)]
pub struct ShareRequest {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    #[validate(email(message = "Invalid email address"))]
    pub user_email: Option<String>,
    /// Defaults to viewer.
    #[serde(default)]
    pub permission: Permission,
}

/// `?folder=` query of the file listing.
#[derive(Debug, Deserialize, Default)]
pub struct FileListQuery {
    pub folder: Option<String>,
}

/// `?parent=` query of the folder listing.
#[derive(Debug, Deserialize, Default)]
pub struct FolderListQuery {
    pub parent: Option<String>,
}

/// `?q=` query of the file search.
#[derive(Debug, Deserialize, Default)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// Parse a folder reference from a query string: absent, empty or `root`
/// means the root.
pub fn parse_folder_param(value: Option<&str>) -> Result<Option<i64>, ApiError> {
    match value.map(str::trim) {
        None | Some("") | Some("root") | Some("null") => Ok(None),
        Some(raw) => raw
            .parse::<i64>()
            .map(Some)
            .map_err(|_| ApiError::bad_request(format!("Invalid folder id: {raw}"))),
    }
}
