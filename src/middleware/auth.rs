use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::access::Actor;
use crate::auth::AuthError;
use crate::state::AppState;

/// Session middleware: verifies the bearer token and injects the [`Actor`]
/// into request extensions. Requests without a valid session stop here with
/// 403 before any handler, database or audit work.
pub async fn session_auth_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let actor = match authenticate(&state, &request) {
        Ok(actor) => actor,
        Err(e) => {
            tracing::debug!(path = %request.uri().path(), error = %e, "Rejected request without valid session");
            return state.reject(e).into_response();
        }
    };

    request.extensions_mut().insert(actor);
    next.run(request).await
}

fn authenticate(state: &AppState, request: &Request) -> Result<Actor, AuthError> {
    let token = extract_bearer_token(request.headers())?;
    let mut actor = state.sessions.verify(token)?.into_actor();
    actor.ip_address = client_ip(request.headers(), request.extensions().get::<ConnectInfo<SocketAddr>>());
    Ok(actor)
}

/// Extract the session token from the Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_str = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidToken("Invalid Authorization header format".to_string()))?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        Some(_) => Err(AuthError::InvalidToken("Empty session token".to_string())),
        None => Err(AuthError::InvalidToken("Authorization header must use Bearer token format".to_string())),
    }
}

/// First `x-forwarded-for` hop, else the peer address.
pub fn client_ip(headers: &HeaderMap, peer: Option<&ConnectInfo<SocketAddr>>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| peer.map(|ConnectInfo(addr)| addr.ip().to_string()))
}
