//! Access guard: exact permission-string membership.
//!
//! Permissions are flat strings such as `gtp:imsi:manage`. There are no
//! wildcards and no hierarchy; `gtp:*` grants nothing.

use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;

use crate::types::Operation;

/// The authenticated caller of a request.
#[derive(Debug, Clone, Serialize)]
pub struct Actor {
    pub username: String,
    pub name: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub permissions: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip)]
    pub ip_address: Option<String>,
}

#[derive(Debug, Error)]
#[error("Permission '{permission}' required for {operation}")]
pub struct Forbidden {
    pub permission: String,
    pub operation: Operation,
}

impl Actor {
    pub fn is_allowed(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    pub fn require(&self, permission: &str, operation: Operation) -> Result<(), Forbidden> {
        if self.is_allowed(permission) {
            Ok(())
        } else {
            Err(Forbidden { permission: permission.to_string(), operation })
        }
    }

    /// Checks an optional declared permission; `None` admits any session.
    pub fn require_declared(&self, permission: Option<&str>, operation: Operation) -> Result<(), Forbidden> {
        match permission {
            Some(permission) => self.require(permission, operation),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(permissions: &[&str]) -> Actor {
        Actor {
            username: "admin".to_string(),
            name: "Dev Admin".to_string(),
            email: None,
            role: None,
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            session_id: None,
            ip_address: None,
        }
    }

    #[test]
    fn exact_membership_only() {
        let a = actor(&["gtp:imsi:manage", "user:manage"]);
        assert!(a.is_allowed("gtp:imsi:manage"));
        assert!(!a.is_allowed("gtp:imsi"));
        assert!(!a.is_allowed("gtp:imsi:manage:extra"));
        assert!(!a.is_allowed("GTP:IMSI:MANAGE"));

        let wildcard = actor(&["gtp:*"]);
        assert!(!wildcard.is_allowed("gtp:imsi:manage"));
    }

    #[test]
    fn require_reports_missing_permission() {
        let a = actor(&["dashboard:read"]);
        let err = a.require("user:manage", Operation::List).unwrap_err();
        assert_eq!(err.permission, "user:manage");
        assert!(a.require_declared(None, Operation::Create).is_ok());
        assert!(a.require_declared(Some("dashboard:read"), Operation::List).is_ok());
    }
}
