use axum::extract::{Path, State};
use axum::Json;
use std::sync::Arc;
use uuid::Uuid;

use vivah_shared::errors::AppResult;
use vivah_shared::types::auth::AuthUser;
use vivah_shared::types::ApiResponse;

use crate::models::PrivacySettings;
use crate::services::visibility::{ProfileAccess, Viewer};
use crate::AppState;

// --- GET /privacy ---

pub async fn get_privacy(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<PrivacySettings>>> {
    let settings = state.engine.visibility.get_privacy(user.id)?;
    Ok(Json(ApiResponse::ok(settings)))
}

// --- PUT /privacy ---

pub async fn update_privacy(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(settings): Json<PrivacySettings>,
) -> AppResult<Json<ApiResponse<PrivacySettings>>> {
    let settings = state.engine.visibility.update_privacy(user.id, settings).await?;
    Ok(Json(ApiResponse::ok_with_message(settings, "privacy settings updated")))
}

// --- GET /profiles/:id/access ---

pub async fn profile_access(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(subject_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ProfileAccess>>> {
    let access = state
        .engine
        .visibility
        .resolve_all(&Viewer::from(&user), subject_id)
        .await?;
    Ok(Json(ApiResponse::ok(access)))
}
