//! Built-in development users for credentials mode.

use once_cell::sync::Lazy;
use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Serialize)]
pub struct DevUser {
    pub id: &'static str,
    pub username: &'static str,
    #[serde(skip)]
    password_sha256: &'static str,
    pub name: &'static str,
    pub email: &'static str,
    pub role: &'static str,
    pub permissions: Vec<&'static str>,
}

impl DevUser {
    pub fn verify_password(&self, password: &str) -> bool {
        hash_password(password) == self.password_sha256
    }
}

pub static DEV_USERS: Lazy<Vec<DevUser>> = Lazy::new(|| {
    vec![
        DevUser {
            id: "1",
            username: "admin",
            password_sha256: "8c6976e5b5410415bde908bd4dee15dfb167a9c873fc4bb8a81f6f2ab448a918",
            name: "Dev Admin",
            email: "admin@example.com",
            role: "admin",
            permissions: vec![
                "dashboard:read",
                "report:telecom:read",
                "node:read",
                "node:update",
                "node:delete",
                "user:manage",
                "grafana",
                "gtp:imsi:manage",
                "gtp:mapping:manage",
                "gtp:session:manage",
            ],
        },
        DevUser {
            id: "2",
            username: "viewer",
            password_sha256: "d35ca5051b82ffc326a3b0b6574a9a3161dee16b9478a199ee39cd803ce5b799",
            name: "Dev Viewer",
            email: "viewer@example.com",
            role: "viewer",
            permissions: vec!["dashboard:read", "node:read"],
        },
    ]
});

pub fn find(username: &str) -> Option<&'static DevUser> {
    DEV_USERS.iter().find(|u| u.username == username)
}

/// Looks up a user and checks the password.
pub fn authenticate(username: &str, password: &str) -> Option<&'static DevUser> {
    find(username).filter(|u| u.verify_password(password))
}

fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authenticates_known_users() {
        assert_eq!(authenticate("admin", "admin").map(|u| u.role), Some("admin"));
        assert_eq!(authenticate("viewer", "viewer").map(|u| u.id), Some("2"));
        assert!(authenticate("admin", "viewer").is_none());
        assert!(authenticate("nobody", "admin").is_none());
    }

    #[test]
    fn serialized_users_carry_no_secret() {
        let json = serde_json::to_value(&*DEV_USERS).unwrap();
        assert!(json[0].get("password_sha256").is_none());
        assert_eq!(json[0]["username"], "admin");
    }
}
