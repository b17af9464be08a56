// handlers/public/auth.rs - POST /auth/login handler

use std::net::SocketAddr;

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::audit::{AuditAction, AuditEntry};
use crate::auth::{dev_users, AuthError};
use crate::config::AuthMode;
use crate::error::ApiError;
use crate::middleware::{client_ip, ApiResponse, ApiResult};
use crate::state::AppState;

const LOGIN_SCREEN: &str = "Login";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// POST /auth/login - Authenticate a development user and receive a session token
///
/// Expected input: `{"username": "admin", "password": "admin"}`
///
/// Expected output:
/// ```json
/// {
///   "success": true,
///   "data": {
///     "token": "eyJhbGciOiJIUzI1NiI...",
///     "user": { "username": "admin", "name": "Dev Admin", "permissions": ["..."] },
///     "expires_in": 86400
///   }
/// }
/// ```
///
/// Both outcomes are written to the audit trail with the client address.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Value> {
    if state.sessions.mode() != AuthMode::Credentials {
        return Err(state.reject(AuthError::LoginDisabled));
    }

    let Json(request) = payload.map_err(|e| ApiError::invalid_json(e.body_text()))?;
    if request.username.trim().is_empty() || request.password.is_empty() {
        return Err(ApiError::bad_request("username and password are required"));
    }

    let ip_address = client_ip(&headers, peer.as_ref());

    let Some(user) = dev_users::authenticate(&request.username, &request.password) else {
        tracing::info!(username = %request.username, "Login failed");
        state
            .audit
            .record(
                AuditEntry::new(request.username.as_str(), AuditAction::LoginFailed)
                    .ip(ip_address)
                    .screen(LOGIN_SCREEN)
                    .details("Invalid username or password")
                    .failed(),
            )
            .await;
        return Err(state.reject(AuthError::InvalidCredentials));
    };

    let (token, claims) = state.sessions.issue(user).map_err(|e| state.reject(e))?;

    state
        .audit
        .record(
            AuditEntry::new(user.username, AuditAction::Login)
                .ip(ip_address)
                .screen(LOGIN_SCREEN)
                .details(format!("Session {}", claims.sid.as_deref().unwrap_or("-"))),
        )
        .await;
    tracing::info!(username = %user.username, "Login succeeded");

    Ok(ApiResponse::success(json!({
        "token": token,
        "user": claims.into_actor(),
        "expires_in": state.sessions.expiry_seconds(),
    })))
}
