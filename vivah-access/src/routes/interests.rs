use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use vivah_shared::errors::{AppError, AppResult};
use vivah_shared::types::auth::AuthUser;
use vivah_shared::types::pagination::{Paginated, PaginationParams};
use vivah_shared::types::ApiResponse;

use crate::models::{Interest, InterestStatus};
use crate::services::interests::Decision;
use crate::services::rate_limiter::QuotaStatus;
use crate::AppState;

// --- POST /interests ---

#[derive(Debug, Deserialize)]
pub struct SendInterestRequest {
    pub receiver_id: Uuid,
}

pub async fn send_interest(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendInterestRequest>,
) -> AppResult<Json<ApiResponse<Interest>>> {
    let interest = state.engine.interests.send_interest(user.id, req.receiver_id).await?;
    Ok(Json(ApiResponse::ok(interest)))
}

// --- PUT /interests/:id/respond ---

#[derive(Debug, Deserialize)]
pub struct RespondInterestRequest {
    pub decision: Decision,
}

pub async fn respond_interest(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(interest_id): Path<Uuid>,
    Json(req): Json<RespondInterestRequest>,
) -> AppResult<Json<ApiResponse<Interest>>> {
    let interest = state
        .engine
        .interests
        .respond_to_interest(interest_id, user.id, req.decision)
        .await?;
    Ok(Json(ApiResponse::ok(interest)))
}

// --- POST /interests/:id/revoke ---

pub async fn revoke_interest(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(interest_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Interest>>> {
    let interest = state.engine.interests.revoke_interest(interest_id, user.id).await?;
    Ok(Json(ApiResponse::ok(interest)))
}

// --- GET /interests/sent ---

pub async fn list_sent(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<Interest>>>> {
    let page = state.engine.interests.list_sent(user.id, &params)?;
    Ok(Json(ApiResponse::ok(page)))
}

// --- GET /interests/received ---

#[derive(Debug, Deserialize)]
pub struct ReceivedQuery {
    pub status: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

pub async fn list_received(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReceivedQuery>,
) -> AppResult<Json<ApiResponse<Paginated<Interest>>>> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<InterestStatus>)
        .transpose()
        .map_err(AppError::bad_request)?;

    let defaults = PaginationParams::default();
    let params = PaginationParams::new(
        query.page.unwrap_or(defaults.page),
        query.per_page.unwrap_or(defaults.per_page),
    );
    let page = state.engine.interests.list_received(user.id, status, &params)?;
    Ok(Json(ApiResponse::ok(page)))
}

// --- GET /interests/quota ---

pub async fn quota(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<QuotaStatus>>> {
    let status = state.engine.rate_limiter.status(user.id)?;
    Ok(Json(ApiResponse::ok(status)))
}

// --- GET /interests/with/:id ---

#[derive(Debug, Serialize)]
pub struct RelationshipResponse {
    pub user_id: Uuid,
    pub relationship: crate::models::RelationshipState,
    pub can_message: bool,
}

pub async fn relationship(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(other_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<RelationshipResponse>>> {
    let relationship = state.engine.interests.interest_between(user.id, other_id)?;
    let can_message = state.engine.messaging.can_message(user.id, other_id)?;
    Ok(Json(ApiResponse::ok(RelationshipResponse {
        user_id: other_id,
        relationship,
        can_message,
    })))
}
