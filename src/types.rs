/// Shared types used across the codebase

use serde::{Deserialize, Serialize};

/// Operations a schema descriptor can expose through its endpoint.
/// Used by the access guard, the persistence mapper and the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    List,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 4] = [Operation::List, Operation::Create, Operation::Update, Operation::Delete];
    pub const MUTATIONS: [Operation; 3] = [Operation::Create, Operation::Update, Operation::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }

    /// Single-character marker written to a descriptor's last-action column.
    pub fn action_code(&self) -> Option<&'static str> {
        match self {
            Operation::List => None,
            Operation::Create => Some("I"),
            Operation::Update => Some("U"),
            Operation::Delete => Some("D"),
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
