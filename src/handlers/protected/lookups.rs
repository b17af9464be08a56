use axum::extract::{Extension, Path, State};

use crate::access::Actor;
use crate::error::ApiError;
use crate::mapper::lookup::{fetch_options, LookupOption};
use crate::middleware::{ApiResponse, ApiResult};
use crate::mock::DATA_SOURCE_HEADER;
use crate::state::AppState;
use crate::types::Operation;

/// GET /api/lookups/:slug/:field - Options for a select field declared with a `lookup` source
///
/// Gated by the descriptor's read permission. The query is built from the
/// descriptor, never from the request.
pub async fn options(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path((slug, field)): Path<(String, String)>,
) -> ApiResult<Vec<LookupOption>> {
    let descriptor = state
        .catalog
        .get(&slug)
        .ok_or_else(|| ApiError::not_found(format!("Schema '{}' not found", slug)))?;
    actor.require_declared(descriptor.permissions.read.as_deref(), Operation::List)?;

    let source = descriptor
        .field(&field)
        .and_then(|f| f.lookup.as_ref())
        .ok_or_else(|| ApiError::not_found(format!("Field '{}' of '{}' has no lookup", field, slug)))?;

    let backend = state
        .backend_for_pool(descriptor.lookup_pool(source))
        .await
        .map_err(|e| state.reject(e))?;
    let options = fetch_options(backend.database(), source).await.map_err(|e| state.reject(e))?;

    let response = ApiResponse::raw(options);
    Ok(if backend.is_mock() { response.with_header(DATA_SOURCE_HEADER, "mock") } else { response })
}
