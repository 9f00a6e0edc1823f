//! Principal roles as resolved by the identity service

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Caller role. The engine consumes a pair resolved upstream by the identity
/// service; it never touches credentials itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Can submit claims and view their own requests
    User,
    /// Can register events and rewards
    Operator,
    /// Can review the full request history
    Auditor,
    /// Full access
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Operator => "operator",
            Role::Auditor => "auditor",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Role::User),
            "operator" => Ok(Role::Operator),
            "auditor" => Ok(Role::Auditor),
            "admin" => Ok(Role::Admin),
            other => Err(Error::InvalidData(format!("unknown role: {other}"))),
        }
    }

    /// Manual approve/reject and unscoped history listing
    pub fn can_review(&self) -> bool {
        matches!(self, Role::Admin | Role::Auditor)
    }

    /// Event and reward registration
    pub fn can_manage_catalog(&self) -> bool {
        matches!(self, Role::Admin | Role::Operator)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authenticated caller: the trusted output of the identity service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub user_id: String,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Principal {
            user_id: user_id.into(),
            role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_rights() {
        assert!(Role::Admin.can_review());
        assert!(Role::Auditor.can_review());
        assert!(!Role::Operator.can_review());
        assert!(!Role::User.can_review());
    }
}
