use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use vivah_shared::errors::AppResult;
use vivah_shared::types::auth::AuthUser;
use vivah_shared::types::ApiResponse;

use crate::models::Message;
use crate::AppState;

// --- POST /messages ---

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub receiver_id: Uuid,
    pub content: String,
}

pub async fn send_message(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendMessageRequest>,
) -> AppResult<Json<ApiResponse<Message>>> {
    let message = state
        .engine
        .messaging
        .send_message(user.id, req.receiver_id, &req.content)
        .await?;
    Ok(Json(ApiResponse::ok(message)))
}

// --- GET /messages/can/:id ---

#[derive(Debug, Serialize)]
pub struct CanMessageResponse {
    pub receiver_id: Uuid,
    pub allowed: bool,
}

pub async fn can_message(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(receiver_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CanMessageResponse>>> {
    let allowed = state.engine.messaging.can_message(user.id, receiver_id)?;
    Ok(Json(ApiResponse::ok(CanMessageResponse { receiver_id, allowed })))
}
