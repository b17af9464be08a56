//! Generic CRUD handlers mounted at each schema descriptor's endpoint.
//!
//! The descriptor arrives as a route-level `Extension`, so one set of handlers
//! serves every entity. Each handler checks the route's read permission and
//! the operation's permission before touching a pool.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Extension, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::access::Actor;
use crate::database::Row;
use crate::error::ApiError;
use crate::mapper::{PersistenceMapper, RangeQuery};
use crate::middleware::{ApiResponse, ApiResult};
use crate::mock::DATA_SOURCE_HEADER;
use crate::schema::SchemaDescriptor;
use crate::state::{AppState, Backend};
use crate::types::Operation;

/// GET {endpoint} - List records, optionally bounded by `from`/`to`
pub async fn list(
    State(state): State<AppState>,
    Extension(descriptor): Extension<Arc<SchemaDescriptor>>,
    Extension(actor): Extension<Actor>,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> ApiResult<Vec<Row>> {
    authorize(&descriptor, &actor, Operation::List)?;
    let Query(range) = query.map_err(|e| ApiError::bad_request(format!("Invalid range parameters: {}", e.body_text())))?;
    let backend = resolve(&state, &descriptor).await?;

    let mapper = PersistenceMapper::new(&descriptor, backend.database(), &state.audit);
    let rows = mapper.list(&range).await.map_err(|e| state.reject(e))?;
    Ok(mark(ApiResponse::raw(rows), &backend))
}

/// POST {endpoint} - Create one record; responds 201 with the stored record
pub async fn create(
    State(state): State<AppState>,
    Extension(descriptor): Extension<Arc<SchemaDescriptor>>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Row> {
    authorize(&descriptor, &actor, Operation::Create)?;
    let Json(body) = payload.map_err(invalid_json)?;
    let backend = resolve(&state, &descriptor).await?;

    let mapper = PersistenceMapper::new(&descriptor, backend.database(), &state.audit);
    let row = mapper.create(&actor, body).await.map_err(|e| state.reject(e))?;
    Ok(mark(ApiResponse::raw(row).with_status(StatusCode::CREATED), &backend))
}

/// PUT {endpoint} - Update the record named by `_identifiers`
pub async fn update(
    State(state): State<AppState>,
    Extension(descriptor): Extension<Arc<SchemaDescriptor>>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Row> {
    authorize(&descriptor, &actor, Operation::Update)?;
    let Json(body) = payload.map_err(invalid_json)?;
    let backend = resolve(&state, &descriptor).await?;

    let mapper = PersistenceMapper::new(&descriptor, backend.database(), &state.audit);
    let data = mapper.update(&actor, body).await.map_err(|e| state.reject(e))?;
    Ok(mark(ApiResponse::success(data), &backend))
}

/// DELETE {endpoint} - Delete (or soft-delete) the record named by the body
pub async fn delete(
    State(state): State<AppState>,
    Extension(descriptor): Extension<Arc<SchemaDescriptor>>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<()> {
    authorize(&descriptor, &actor, Operation::Delete)?;
    let Json(body) = payload.map_err(invalid_json)?;
    let backend = resolve(&state, &descriptor).await?;

    let mapper = PersistenceMapper::new(&descriptor, backend.database(), &state.audit);
    mapper.delete(&actor, body).await.map_err(|e| state.reject(e))?;
    Ok(mark(ApiResponse::ok(), &backend))
}

/// Read permission gates every method on the route; mutations also need their own.
fn authorize(descriptor: &SchemaDescriptor, actor: &Actor, operation: Operation) -> Result<(), ApiError> {
    actor.require_declared(descriptor.permissions.read.as_deref(), Operation::List)?;
    if operation != Operation::List {
        actor.require_declared(descriptor.permissions.for_operation(operation), operation)?;
    }
    Ok(())
}

async fn resolve(state: &AppState, descriptor: &SchemaDescriptor) -> Result<Backend, ApiError> {
    state.backend_for(descriptor).await.map_err(|e| state.reject(e))
}

fn mark<T: Serialize>(response: ApiResponse<T>, backend: &Backend) -> ApiResponse<T> {
    if backend.is_mock() {
        response.with_header(DATA_SOURCE_HEADER, "mock")
    } else {
        response
    }
}

fn invalid_json(rejection: JsonRejection) -> ApiError {
    ApiError::invalid_json(rejection.body_text())
}
