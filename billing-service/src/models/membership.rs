//! Membership model: the account-organization relation with a role.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Member roles, ordered: `Member < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Member,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "admin" => Role::Admin,
            _ => Role::Member,
        }
    }

    /// Whether a member holding `self` satisfies a `required` role.
    pub fn satisfies(&self, required: Role) -> bool {
        *self >= required
    }
}

/// Unique per (account, organization). Every organization keeps at least
/// one admin at all times; removal enforces this.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Membership {
    pub account_id: Uuid,
    pub organization_id: Uuid,
    pub role: String,
    pub created_utc: DateTime<Utc>,
}

impl Membership {
    pub fn role(&self) -> Role {
        Role::from_str(&self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_satisfies_member_requirement() {
        assert!(Role::Admin.satisfies(Role::Member));
        assert!(Role::Admin.satisfies(Role::Admin));
    }

    #[test]
    fn member_does_not_satisfy_admin_requirement() {
        assert!(!Role::Member.satisfies(Role::Admin));
        assert!(Role::Member.satisfies(Role::Member));
    }
}
