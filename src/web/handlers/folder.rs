//! Folder handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::AppState;
use crate::drive::{Folder, ShareTarget};
use crate::web::dto::{
    parse_folder_param, ApiResponse, ContentsResponse, CreateFolderRequest, FolderActionResponse,
    FolderDeleteResponse, FolderListQuery, FolderResponse, MoveFolderRequest, RenameRequest,
    ShareRequest, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::middleware::{AuthUser, OptionalAuthUser};

fn folder_list(folders: Vec<Folder>) -> Json<ApiResponse<Vec<FolderResponse>>> {
    Json(ApiResponse::new(
        folders.into_iter().map(FolderResponse::from).collect(),
    ))
}

fn action(message: &str, folder: &Folder) -> Json<ApiResponse<FolderActionResponse>> {
    Json(ApiResponse::new(FolderActionResponse::new(message, folder)))
}

/// POST /api/folders - Create a folder.
pub async fn create_folder(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    ValidatedJson(req): ValidatedJson<CreateFolderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<FolderResponse>>), ApiError> {
    let folder = state
        .folders()
        .create(claims.sub, &req.name, req.parent_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(FolderResponse::from(folder))),
    ))
}

/// GET /api/folders?parent= - List the caller's folders under one parent.
pub async fn list_folders(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Query(query): Query<FolderListQuery>,
) -> Result<Json<ApiResponse<Vec<FolderResponse>>>, ApiError> {
    let parent_id = parse_folder_param(query.parent.as_deref())?;
    let folders = state.folders().list(claims.sub, parent_id).await?;
    Ok(folder_list(folders))
}

/// GET /api/folders/root/contents
pub async fn root_contents(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
) -> Result<Json<ApiResponse<ContentsResponse>>, ApiError> {
    let contents = state.folders().contents(claims.sub, None).await?;
    Ok(Json(ApiResponse::new(ContentsResponse::from(contents))))
}

/// GET /api/folders/:id/contents - Subfolders and non-trashed files.
pub async fn folder_contents(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<ContentsResponse>>, ApiError> {
    let contents = state.folders().contents(claims.sub, Some(id)).await?;
    Ok(Json(ApiResponse::new(ContentsResponse::from(contents))))
}

/// GET /api/folders/:id - Folder metadata; public folders need no token.
pub async fn get_folder(
    State(state): State<Arc<AppState>>,
    auth: OptionalAuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<FolderResponse>>, ApiError> {
    let folder = state.folders().get(auth.user_id(), id).await?;
    Ok(Json(ApiResponse::new(FolderResponse::from(folder))))
}

/// GET /api/folders/:id/breadcrumbs - Ancestors root first, then the folder.
pub async fn folder_breadcrumbs(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<FolderResponse>>>, ApiError> {
    let crumbs = state.folders().breadcrumbs(claims.sub, id).await?;
    Ok(folder_list(crumbs))
}

/// PUT /api/folders/:id/rename
pub async fn rename_folder(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<RenameRequest>,
) -> Result<Json<ApiResponse<FolderActionResponse>>, ApiError> {
    let folder = state.folders().rename(claims.sub, id, &req.name).await?;
    Ok(action("Folder renamed", &folder))
}

/// PUT /api/folders/:id/move - Reparent a folder, or move it to the root with null.
pub async fn move_folder(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<MoveFolderRequest>,
) -> Result<Json<ApiResponse<FolderActionResponse>>, ApiError> {
    let folder = state
        .folders()
        .move_to(claims.sub, id, req.parent_id)
        .await?;
    Ok(action("Folder moved", &folder))
}

/// DELETE /api/folders/:id - Delete a folder with everything below it.
pub async fn delete_folder(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<FolderDeleteResponse>>, ApiError> {
    let summary = state.folders().delete(claims.sub, id).await?;

    Ok(Json(ApiResponse::new(FolderDeleteResponse {
        message: "Folder deleted".to_string(),
        deleted_folders: summary.folders,
        deleted_files: summary.files,
    })))
}

/// POST /api/folders/:id/share
pub async fn share_folder(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<ShareRequest>,
) -> Result<Json<ApiResponse<FolderActionResponse>>, ApiError> {
    let target = ShareTarget::from_parts(req.user_id, req.user_email.as_deref())?;

    let folder = state
        .folders()
        .share(claims.sub, id, &target, req.permission)
        .await?;
    Ok(action("Folder shared", &folder))
}

/// DELETE /api/folders/:id/share/:user_id
pub async fn unshare_folder(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path((id, user_id)): Path<(i64, i64)>,
) -> Result<Json<ApiResponse<FolderActionResponse>>, ApiError> {
    let folder = state.folders().unshare(claims.sub, id, user_id).await?;
    Ok(action("Share removed", &folder))
}

/// POST /api/folders/:id/public
pub async fn publish_folder(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<FolderActionResponse>>, ApiError> {
    let folder = state.folders().publish(claims.sub, id).await?;
    Ok(action("Public link created", &folder))
}

/// DELETE /api/folders/:id/public
pub async fn unpublish_folder(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<FolderActionResponse>>, ApiError> {
    let folder = state.folders().unpublish(claims.sub, id).await?;
    Ok(action("Public link removed", &folder))
}

/// PUT /api/folders/:id/star - Toggle the star flag.
pub async fn star_folder(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<FolderActionResponse>>, ApiError> {
    let folder = state.folders().toggle_star(claims.sub, id).await?;
    let message = if folder.is_starred {
        "Folder starred"
    } else {
        "Folder unstarred"
    };
    Ok(action(message, &folder))
}

/// GET /api/folders/starred/all
pub async fn list_starred_folders(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
) -> Result<Json<ApiResponse<Vec<FolderResponse>>>, ApiError> {
    let folders = state.folders().starred(claims.sub).await?;
    Ok(folder_list(folders))
}

/// GET /api/folders/shared/me - Folders other users shared with the caller.
pub async fn list_shared_folders(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
) -> Result<Json<ApiResponse<Vec<FolderResponse>>>, ApiError> {
    let folders = state.folders().shared_with(claims.sub).await?;
    Ok(folder_list(folders))
}
