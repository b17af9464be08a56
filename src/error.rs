// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::access::Forbidden;
use crate::auth::directory::DirectoryError;
use crate::auth::AuthError;
use crate::database::DatabaseError;
use crate::mapper::MapperError;
use crate::schema::SchemaError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },
    InvalidJson(String),

    // 401 Unauthorized: bad credentials on login
    InvalidCredentials(String),

    // 403 Forbidden: no valid session
    Unauthorized(String),

    // 403 Forbidden: session lacks the permission
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 500 Internal Server Error
    InternalServerError { message: String, detail: Option<String> },
    DatabaseNotConfigured { message: String, detail: Option<String> },
    Database { message: String, detail: Option<String> },
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::InvalidJson(_) => 400,
            ApiError::InvalidCredentials(_) => 401,
            ApiError::Unauthorized(_) => 403,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::InternalServerError { .. } => 500,
            ApiError::DatabaseNotConfigured { .. } => 500,
            ApiError::Database { .. } => 500,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::InvalidJson(msg) => msg,
            ApiError::InvalidCredentials(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::InternalServerError { message, .. } => message,
            ApiError::DatabaseNotConfigured { message, .. } => message,
            ApiError::Database { message, .. } => message,
        }
    }

    /// Underlying cause, present only until `redact` strips it.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::InternalServerError { detail, .. }
            | ApiError::DatabaseNotConfigured { detail, .. }
            | ApiError::Database { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// Drops the raw cause so it never reaches production clients.
    pub fn redact(mut self, production: bool) -> Self {
        if production {
            if let ApiError::InternalServerError { detail, .. }
            | ApiError::DatabaseNotConfigured { detail, .. }
            | ApiError::Database { detail, .. } = &mut self
            {
                *detail = None;
            }
        }
        self
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut response = json!({
            "error": true,
            "message": self.message(),
            "code": self.error_code()
        });

        if let ApiError::ValidationError { field_errors: Some(field_errors), .. } = self {
            response["field_errors"] = json!(field_errors);
        }
        if let Some(detail) = self.detail() {
            response["detail"] = json!(detail);
        }

        response
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::InvalidCredentials(_) => "INVALID_CREDENTIALS",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InternalServerError { .. } => "INTERNAL_SERVER_ERROR",
            ApiError::DatabaseNotConfigured { .. } => "DATABASE_NOT_CONFIGURED",
            ApiError::Database { .. } => "DATABASE_ERROR",
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(message: impl Into<String>, field_errors: Option<HashMap<String, String>>) -> Self {
        ApiError::ValidationError { message: message.into(), field_errors }
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn invalid_credentials(message: impl Into<String>) -> Self {
        ApiError::InvalidCredentials(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>, detail: Option<String>) -> Self {
        ApiError::InternalServerError { message: message.into(), detail }
    }
}

// Convert other error types to ApiError
impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        if err.is_configuration() {
            tracing::error!("Database configuration error: {}", err);
            return ApiError::DatabaseNotConfigured {
                message: "Database is not configured for this resource".to_string(),
                detail: Some(err.to_string()),
            };
        }
        match err {
            DatabaseError::InvalidIdentifier(_) | DatabaseError::UnboundedStatement(..) => {
                tracing::error!("Refused to build statement: {}", err);
                ApiError::internal_server_error("Invalid statement", Some(err.to_string()))
            }
            other => {
                // Log the real error but return generic message
                tracing::error!("Database error: {}", other);
                ApiError::Database { message: "Database error occurred".to_string(), detail: Some(other.to_string()) }
            }
        }
    }
}

impl From<MapperError> for ApiError {
    fn from(err: MapperError) -> Self {
        if let Some(field_errors) = err.field_errors() {
            return ApiError::validation_error(err.to_string(), Some(field_errors));
        }
        match err {
            MapperError::Database(e) => e.into(),
            MapperError::InvalidPayload(msg) => ApiError::bad_request(msg),
            other => ApiError::validation_error(other.to_string(), None),
        }
    }
}

impl From<Forbidden> for ApiError {
    fn from(err: Forbidden) -> Self {
        ApiError::forbidden(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken | AuthError::InvalidToken(_) => ApiError::unauthorized(err.to_string()),
            AuthError::InvalidCredentials => ApiError::invalid_credentials(err.to_string()),
            AuthError::LoginDisabled => ApiError::forbidden(err.to_string()),
            AuthError::NotConfigured | AuthError::TokenGeneration(_) => {
                tracing::error!("Session error: {}", err);
                ApiError::internal_server_error("Failed to create session", Some(err.to_string()))
            }
        }
    }
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        let field_errors: HashMap<String, String> = match &err {
            DirectoryError::MissingFields(fields) => fields.iter().map(|f| (f.to_string(), "required".to_string())).collect(),
            DirectoryError::Duplicate(_) => HashMap::from([("username".to_string(), "already exists".to_string())]),
        };
        ApiError::validation_error(err.to_string(), Some(field_errors))
    }
}

impl From<SchemaError> for ApiError {
    fn from(err: SchemaError) -> Self {
        ApiError::internal_server_error("Schema configuration error", Some(err.to_string()))
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}
