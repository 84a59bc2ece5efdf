//! Organization model: a billing tenant holding the prepaid credit balance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationType {
    Individual,
    LegalEntity,
    Agency,
}

impl OrganizationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrganizationType::Individual => "individual",
            OrganizationType::LegalEntity => "legal_entity",
            OrganizationType::Agency => "agency",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "individual" => OrganizationType::Individual,
            "agency" => OrganizationType::Agency,
            _ => OrganizationType::LegalEntity,
        }
    }
}

/// A billing tenant. `credit_balance` is mutated only through the credit
/// ledger and reconciler credit grants; it can never go negative.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Organization {
    pub organization_id: Uuid,
    pub name: String,
    pub organization_type: String,
    pub is_personal: bool,
    pub credit_balance: i64,
    pub created_utc: DateTime<Utc>,
}

impl Organization {
    pub fn organization_type(&self) -> OrganizationType {
        OrganizationType::from_str(&self.organization_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_defaults_to_legal_entity() {
        assert_eq!(
            OrganizationType::from_str("something_else"),
            OrganizationType::LegalEntity
        );
    }

    #[test]
    fn type_roundtrip() {
        for t in [
            OrganizationType::Individual,
            OrganizationType::LegalEntity,
            OrganizationType::Agency,
        ] {
            assert_eq!(OrganizationType::from_str(t.as_str()), t);
        }
    }
}
