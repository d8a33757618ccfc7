use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use vivah_shared::errors::{AppError, AppResult, ErrorCode};
use vivah_shared::middleware::ModeratorUser;
use vivah_shared::types::auth::AuthUser;
use vivah_shared::types::ApiResponse;

use crate::models::Photo;
use crate::services::photos::PhotoGallery;
use crate::services::visibility::Viewer;
use crate::AppState;

// --- POST /photos ---

pub async fn upload_photo(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> AppResult<Json<ApiResponse<Photo>>> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(format!("failed to read multipart: {e}")))?
        .ok_or_else(|| AppError::new(ErrorCode::ValidationError, "no file provided"))?;

    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();

    let data = field
        .bytes()
        .await
        .map_err(|e| AppError::bad_request(format!("failed to read file data: {e}")))?;

    let photo = state
        .engine
        .photos
        .upload(user.id, &content_type, data.to_vec())
        .await?;

    Ok(Json(ApiResponse::ok(photo)))
}

// --- GET /users/:id/photos ---

pub async fn list_photos(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(owner_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<PhotoGallery>>> {
    let gallery = state
        .engine
        .photos
        .visible_photos(&Viewer::from(&user), owner_id)
        .await?;
    Ok(Json(ApiResponse::ok(gallery)))
}

// --- PUT /photos/:id/primary ---

pub async fn set_primary(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(photo_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Photo>>> {
    let photo = state.engine.photos.set_primary(user.id, photo_id).await?;
    Ok(Json(ApiResponse::ok(photo)))
}

// --- DELETE /photos/:id ---

#[derive(Debug, Serialize)]
pub struct DeletePhotoResponse {
    pub deleted: Uuid,
    pub promoted_primary: Option<Uuid>,
}

pub async fn delete_photo(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(photo_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<DeletePhotoResponse>>> {
    let promoted_primary = state.engine.photos.delete_photo(user.id, photo_id).await?;
    Ok(Json(ApiResponse::ok(DeletePhotoResponse { deleted: photo_id, promoted_primary })))
}

// --- PUT /photos/:id/moderation ---

#[derive(Debug, Deserialize)]
pub struct ModerationRequest {
    pub approved: bool,
}

pub async fn moderate_photo(
    ModeratorUser(moderator): ModeratorUser,
    State(state): State<Arc<AppState>>,
    Path(photo_id): Path<Uuid>,
    Json(req): Json<ModerationRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    state
        .engine
        .photos
        .moderate_photo(&moderator, photo_id, req.approved)
        .await?;
    Ok(Json(ApiResponse::ok(())))
}
