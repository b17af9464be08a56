use axum::extract::{Extension, Path, State};
use serde_json::{json, Value};

use crate::access::Actor;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::schema::SchemaDescriptor;
use crate::state::AppState;
use crate::types::Operation;

/// GET /api/schemas - Descriptors the caller may read, with the operations it may perform
pub async fn list(State(state): State<AppState>, Extension(actor): Extension<Actor>) -> ApiResult<Vec<Value>> {
    let schemas = state
        .catalog
        .iter()
        .filter(|d| actor.require_declared(d.permissions.read.as_deref(), Operation::List).is_ok())
        .map(|d| describe(d, &actor))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ApiResponse::success(schemas))
}

/// GET /api/schemas/:slug - One descriptor
pub async fn get(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(slug): Path<String>,
) -> ApiResult<Value> {
    let descriptor = state
        .catalog
        .get(&slug)
        .ok_or_else(|| ApiError::not_found(format!("Schema '{}' not found", slug)))?;
    actor.require_declared(descriptor.permissions.read.as_deref(), Operation::List)?;
    Ok(ApiResponse::success(describe(descriptor, &actor)?))
}

fn describe(descriptor: &SchemaDescriptor, actor: &Actor) -> Result<Value, ApiError> {
    let mut value = serde_json::to_value(descriptor)
        .map_err(|e| ApiError::internal_server_error("Failed to serialize schema", Some(e.to_string())))?;
    let allowed: Vec<Operation> = descriptor
        .offered_operations()
        .into_iter()
        .filter(|op| actor.require_declared(descriptor.permissions.for_operation(*op), *op).is_ok())
        .collect();
    value["operations"] = json!(allowed);
    Ok(value)
}
