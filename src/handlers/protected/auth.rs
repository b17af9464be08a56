// handlers/protected/auth.rs - session routes under /api/auth

use axum::extract::{Extension, State};

use crate::access::Actor;
use crate::audit::{AuditAction, AuditEntry};
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// GET /api/auth/whoami - The actor behind the current session
pub async fn whoami(Extension(actor): Extension<Actor>) -> ApiResult<Actor> {
    Ok(ApiResponse::success(actor))
}

/// POST /api/auth/logout - Records the logout; tokens are stateless and simply expire
pub async fn logout(State(state): State<AppState>, Extension(actor): Extension<Actor>) -> ApiResult<()> {
    let mut entry = AuditEntry::new(actor.username.as_str(), AuditAction::Logout)
        .ip(actor.ip_address.clone())
        .screen("Logout");
    if let Some(sid) = &actor.session_id {
        entry = entry.details(format!("Session {}", sid));
    }
    state.audit.record(entry).await;
    tracing::info!(username = %actor.username, "Logout");
    Ok(ApiResponse::ok())
}
