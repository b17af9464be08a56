// handlers/protected/users.rs - GET and POST /api/users

use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    http::StatusCode,
    Json,
};

use crate::access::Actor;
use crate::auth::directory::{NewUser, UserRecord};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;
use crate::types::Operation;

const USER_MANAGE: &str = "user:manage";

/// GET /api/users - Known users, without credentials
pub async fn list(State(state): State<AppState>, Extension(actor): Extension<Actor>) -> ApiResult<Vec<UserRecord>> {
    actor.require(USER_MANAGE, Operation::List)?;
    Ok(ApiResponse::raw(state.users.list().await))
}

/// POST /api/users - Add a user to the in-memory directory
///
/// `username` and `email` are required. Responds 201 with the new record.
pub async fn create(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> ApiResult<UserRecord> {
    actor.require(USER_MANAGE, Operation::Create)?;
    let Json(new_user) = payload.map_err(|e| ApiError::invalid_json(e.body_text()))?;
    let record = state.users.add(new_user).await?;
    Ok(ApiResponse::raw(record).with_status(StatusCode::CREATED))
}
