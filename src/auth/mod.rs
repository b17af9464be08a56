//! Session tokens.
//!
//! In credentials mode the service signs its own HS256 session tokens for the
//! built-in development users. In identity-provider mode local login is off
//! and tokens are accepted only when issued by the configured issuer for the
//! configured client.

pub mod dev_users;
pub mod directory;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::access::Actor;
use crate::config::{AppConfig, AuthMode};
use dev_users::DevUser;

/// Issuer stamped on locally signed session tokens.
pub const LOCAL_ISSUER: &str = "portal-api";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingToken,

    #[error("Invalid session: {0}")]
    InvalidToken(String),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Local login is disabled when AUTH_MODE=keycloak")]
    LoginDisabled,

    #[error("Session signing secret is not configured")]
    NotConfigured,

    #[error("Token generation failed: {0}")]
    TokenGeneration(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RealmAccess {
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm_access: Option<RealmAccess>,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn for_user(user: &DevUser, expiry_hours: u64) -> Result<Self, AuthError> {
        let now = Utc::now();
        let exp = i64::try_from(expiry_hours)
            .ok()
            .and_then(Duration::try_hours)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| AuthError::TokenGeneration(format!("session expiry of {} hours is out of range", expiry_hours)))?
            .timestamp();

        Ok(Self {
            sub: user.username.to_string(),
            name: Some(user.name.to_string()),
            email: Some(user.email.to_string()),
            role: Some(user.role.to_string()),
            permissions: user.permissions.iter().map(|p| p.to_string()).collect(),
            sid: Some(Uuid::new_v4().to_string()),
            iss: Some(LOCAL_ISSUER.to_string()),
            preferred_username: None,
            realm_access: None,
            iat: now.timestamp(),
            exp,
        })
    }

    pub fn into_actor(self) -> Actor {
        let username = self.preferred_username.unwrap_or(self.sub);
        let mut permissions: std::collections::BTreeSet<String> = self.permissions.into_iter().collect();
        if let Some(realm) = self.realm_access {
            permissions.extend(realm.roles);
        }
        Actor {
            name: self.name.unwrap_or_else(|| username.clone()),
            username,
            email: self.email,
            role: self.role,
            permissions,
            session_id: self.sid,
            ip_address: None,
        }
    }
}

/// Signing and verification keys for session tokens.
pub struct SessionKeys {
    mode: AuthMode,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    expiry_hours: u64,
}

impl SessionKeys {
    pub fn from_config(config: &AppConfig) -> Result<Self, AuthError> {
        let secret = config.session_secret().ok_or(AuthError::NotConfigured)?;
        let mut validation = Validation::new(Algorithm::HS256);
        match (&config.auth.mode, &config.auth.keycloak) {
            (AuthMode::Keycloak, Some(keycloak)) => {
                validation.set_issuer(&[keycloak.issuer.as_str()]);
                validation.set_audience(&[keycloak.client_id.as_str()]);
            }
            (AuthMode::Keycloak, None) => return Err(AuthError::NotConfigured),
            (AuthMode::Credentials, _) => validation.set_issuer(&[LOCAL_ISSUER]),
        }

        Ok(Self {
            mode: config.auth.mode,
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            expiry_hours: config.auth.session_expiry_hours,
        })
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub fn expiry_seconds(&self) -> u64 {
        self.expiry_hours.saturating_mul(3600)
    }

    /// Signs a session token for a development user.
    pub fn issue(&self, user: &DevUser) -> Result<(String, Claims), AuthError> {
        if self.mode != AuthMode::Credentials {
            return Err(AuthError::LoginDisabled);
        }
        let claims = Claims::for_user(user, self.expiry_hours)?;
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::TokenGeneration(e.to_string()))?;
        Ok((token, claims))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}
