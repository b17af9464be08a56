//! User records served by `/api/users`.
//!
//! Seeded from the development users. Users added through the API live in
//! memory for the life of the process and cannot log in.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use super::dev_users::{DevUser, DEV_USERS};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub permissions: Vec<String>,
}

impl From<&DevUser> for UserRecord {
    fn from(user: &DevUser) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username.to_string(),
            name: Some(user.name.to_string()),
            email: user.email.to_string(),
            role: Some(user.role.to_string()),
            permissions: user.permissions.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Body of `POST /api/users`. Unknown keys, including any password, are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct NewUser {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("User '{0}' already exists")]
    Duplicate(String),
}

pub struct UserDirectory {
    users: RwLock<Vec<UserRecord>>,
}

impl UserDirectory {
    pub fn seeded() -> Self {
        Self { users: RwLock::new(DEV_USERS.iter().map(UserRecord::from).collect()) }
    }

    pub async fn list(&self) -> Vec<UserRecord> {
        self.users.read().await.clone()
    }

    pub async fn add(&self, new: NewUser) -> Result<UserRecord, DirectoryError> {
        let username = new.username.map(|u| u.trim().to_string()).filter(|u| !u.is_empty());
        let email = new.email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty());
        let (username, email) = match (username, email) {
            (Some(username), Some(email)) => (username, email),
            (username, email) => {
                let mut missing = Vec::new();
                if username.is_none() {
                    missing.push("username");
                }
                if email.is_none() {
                    missing.push("email");
                }
                return Err(DirectoryError::MissingFields(missing));
            }
        };

        let mut users = self.users.write().await;
        if users.iter().any(|u| u.username == username) {
            return Err(DirectoryError::Duplicate(username));
        }
        let record = UserRecord {
            id: Uuid::new_v4().simple().to_string(),
            username,
            name: new.name,
            email,
            role: new.role,
            permissions: new.permissions,
        };
        users.push(record.clone());
        info!(username = %record.username, id = %record.id, "Added user");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: Some(username.to_string()),
            email: Some(email.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn seeded_with_development_users() {
        let directory = UserDirectory::seeded();
        let users = directory.list().await;
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].username, "admin");
        assert_eq!(users[1].role.as_deref(), Some("viewer"));
    }

    #[tokio::test]
    async fn added_users_are_listed() {
        let directory = UserDirectory::seeded();
        let record = directory.add(new_user("noc", "noc@example.com")).await.unwrap();
        assert_eq!(record.id.len(), 32);
        assert!(record.permissions.is_empty());
        assert_eq!(directory.list().await.last(), Some(&record));
    }

    #[tokio::test]
    async fn username_and_email_are_required() {
        let directory = UserDirectory::seeded();
        let err = directory.add(NewUser::default()).await.unwrap_err();
        assert!(matches!(err, DirectoryError::MissingFields(ref f) if f == &["username", "email"]));

        let err = directory.add(new_user("noc", "  ")).await.unwrap_err();
        assert!(matches!(err, DirectoryError::MissingFields(ref f) if f == &["email"]));
        assert_eq!(directory.list().await.len(), 2);
    }

    #[tokio::test]
    async fn usernames_are_unique() {
        let directory = UserDirectory::seeded();
        let err = directory.add(new_user("admin", "other@example.com")).await.unwrap_err();
        assert!(matches!(err, DirectoryError::Duplicate(ref u) if u == "admin"));
    }
}
