//! File handlers.

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::AppState;
use crate::drive::{DriveFile, ShareTarget, UploadRequest};
use crate::web::dto::{
    parse_folder_param, ApiResponse, DownloadResponse, EmptyTrashResponse, FileActionResponse,
    FileListQuery, FileResponse, MessageResponse, MoveFileRequest, OwnedFileResponse,
    RenameRequest, SearchQuery, ShareRequest, UsageResponse, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::middleware::{AuthUser, OptionalAuthUser};

fn file_list(files: Vec<DriveFile>) -> Json<ApiResponse<Vec<FileResponse>>> {
    Json(ApiResponse::new(
        files.into_iter().map(FileResponse::from).collect(),
    ))
}

fn action(message: &str, file: &DriveFile) -> Json<ApiResponse<FileActionResponse>> {
    Json(ApiResponse::new(FileActionResponse::new(message, file)))
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::payload_too_large("File exceeds the upload size limit");
    }
    tracing::debug!("Failed to read multipart field: {}", e);
    ApiError::bad_request("Invalid multipart data")
}

/// GET /api/files?folder= - List the caller's files in one folder.
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Query(query): Query<FileListQuery>,
) -> Result<Json<ApiResponse<Vec<FileResponse>>>, ApiError> {
    let folder_id = parse_folder_param(query.folder.as_deref())?;
    let files = state.files().list(claims.sub, folder_id).await?;
    Ok(file_list(files))
}

/// POST /api/files/upload - Upload a file.
///
/// Request body: multipart/form-data with a "file" field and an optional
/// "folder_id" field.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<FileResponse>>), ApiError> {
    let mut filename: Option<String> = None;
    let mut content: Option<Vec<u8>> = None;
    let mut folder_id: Option<i64> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name().unwrap_or("") {
            "file" => {
                filename = field.file_name().map(|s| s.to_string());
                content = Some(field.bytes().await.map_err(multipart_error)?.to_vec());
            }
            "folder_id" => {
                let raw = field.text().await.map_err(multipart_error)?;
                folder_id = parse_folder_param(Some(&raw))?;
            }
            _ => {}
        }
    }

    let content = content.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    let filename = filename
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing file name"))?;

    let request = UploadRequest::new(filename, content).in_folder(folder_id);
    let file = state.files().upload(claims.sub, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(FileResponse::from(file))),
    ))
}

/// GET /api/files/:id - File metadata; public files need no token.
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    auth: OptionalAuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<FileResponse>>, ApiError> {
    let file = state.files().get(auth.user_id(), id).await?;
    Ok(Json(ApiResponse::new(FileResponse::from(file))))
}

/// GET /api/files/:id/download - Download descriptor for a readable file.
///
/// Anonymous callers use `/public/:id/download` instead.
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<DownloadResponse>>, ApiError> {
    let info = state.files().download(claims.sub, id).await?;
    Ok(Json(ApiResponse::new(DownloadResponse::from(info))))
}

/// PUT /api/files/:id/rename
pub async fn rename_file(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<RenameRequest>,
) -> Result<Json<ApiResponse<FileActionResponse>>, ApiError> {
    let file = state.files().rename(claims.sub, id, &req.name).await?;
    Ok(action("File renamed", &file))
}

/// PUT /api/files/:id/move - Move into a folder, or to the root with null.
pub async fn move_file(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<MoveFileRequest>,
) -> Result<Json<ApiResponse<FileActionResponse>>, ApiError> {
    let file = state.files().move_to(claims.sub, id, req.folder_id).await?;
    Ok(action("File moved", &file))
}

/// PUT /api/files/:id/trash and DELETE /api/files/:id - Soft delete.
pub async fn trash_file(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<FileActionResponse>>, ApiError> {
    let file = state.files().trash(claims.sub, id).await?;
    Ok(action("File moved to trash", &file))
}

/// PUT /api/files/:id/restore
pub async fn restore_file(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<FileActionResponse>>, ApiError> {
    let file = state.files().restore(claims.sub, id).await?;
    Ok(action("File restored", &file))
}

/// DELETE /api/files/:id/permanent - Purge a trashed file.
pub async fn purge_file(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.files().purge(claims.sub, id).await?;
    Ok(Json(ApiResponse::new(MessageResponse::new(
        "File permanently deleted",
    ))))
}

/// GET /api/files/trash/all
pub async fn list_trash(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
) -> Result<Json<ApiResponse<Vec<FileResponse>>>, ApiError> {
    let files = state.files().trashed(claims.sub).await?;
    Ok(file_list(files))
}

/// DELETE /api/files/trash/empty
pub async fn empty_trash(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
) -> Result<Json<ApiResponse<EmptyTrashResponse>>, ApiError> {
    let deleted = state.files().empty_trash(claims.sub).await?;
    Ok(Json(ApiResponse::new(EmptyTrashResponse {
        message: "Trash emptied".to_string(),
        deleted,
    })))
}

/// PUT /api/files/:id/star - Toggle the star flag.
pub async fn star_file(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<FileActionResponse>>, ApiError> {
    let file = state.files().toggle_star(claims.sub, id).await?;
    let message = if file.is_starred {
        "File starred"
    } else {
        "File unstarred"
    };
    Ok(action(message, &file))
}

/// GET /api/files/starred/all
pub async fn list_starred_files(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
) -> Result<Json<ApiResponse<Vec<FileResponse>>>, ApiError> {
    let files = state.files().starred(claims.sub).await?;
    Ok(file_list(files))
}

/// GET /api/files/recent/all
pub async fn list_recent(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
) -> Result<Json<ApiResponse<Vec<FileResponse>>>, ApiError> {
    let files = state.files().recent(claims.sub).await?;
    Ok(file_list(files))
}

/// GET /api/files/search/query?q=
pub async fn search_files(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ApiResponse<Vec<FileResponse>>>, ApiError> {
    let files = state.files().search(claims.sub, &query.q).await?;
    Ok(file_list(files))
}

/// GET /api/files/shared/me - Files other users shared with the caller.
pub async fn list_shared_files(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
) -> Result<Json<ApiResponse<Vec<OwnedFileResponse>>>, ApiError> {
    let files = state.files().shared_with(claims.sub).await?;
    Ok(Json(ApiResponse::new(
        files.into_iter().map(OwnedFileResponse::from).collect(),
    )))
}

/// POST /api/files/:id/share
pub async fn share_file(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<ShareRequest>,
) -> Result<Json<ApiResponse<FileActionResponse>>, ApiError> {
    let target = ShareTarget::from_parts(req.user_id, req.user_email.as_deref())?;

    let file = state
        .files()
        .share(claims.sub, id, &target, req.permission)
        .await?;
    Ok(action("File shared", &file))
}

/// DELETE /api/files/:id/share/:user_id
pub async fn unshare_file(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path((id, user_id)): Path<(i64, i64)>,
) -> Result<Json<ApiResponse<FileActionResponse>>, ApiError> {
    let file = state.files().unshare(claims.sub, id, user_id).await?;
    Ok(action("Share removed", &file))
}

/// POST /api/files/:id/public - Create a public link.
pub async fn publish_file(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<FileActionResponse>>, ApiError> {
    let file = state.files().publish(claims.sub, id).await?;
    Ok(action("Public link created", &file))
}

/// DELETE /api/files/:id/public - Revoke the public link.
pub async fn unpublish_file(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<FileActionResponse>>, ApiError> {
    let file = state.files().unpublish(claims.sub, id).await?;
    Ok(action("Public link removed", &file))
}

/// GET /api/files/public/:id - Public file view with its owner.
pub async fn get_public_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<OwnedFileResponse>>, ApiError> {
    let file = state.files().get_public(id).await?;
    Ok(Json(ApiResponse::new(OwnedFileResponse::from(file))))
}

/// GET /api/files/public/:id/download
pub async fn download_public_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<DownloadResponse>>, ApiError> {
    let info = state.files().public_download(id).await?;
    Ok(Json(ApiResponse::new(DownloadResponse::from(info))))
}

/// GET /api/files/usage/me - Storage usage against the caller's quota.
pub async fn storage_usage(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
) -> Result<Json<ApiResponse<UsageResponse>>, ApiError> {
    let usage = state.files().usage(claims.sub).await?;
    Ok(Json(ApiResponse::new(UsageResponse::from(usage))))
}
