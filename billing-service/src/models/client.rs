//! Client profiles: sub-tenants owned by an agency organization.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A sub-tenant with its own document quota. Invariants:
/// `0 <= credits_used <= credit_limit`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ClientProfile {
    pub client_profile_id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub credit_limit: i64,
    pub credits_used: i64,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
}

impl ClientProfile {
    pub fn remaining_credits(&self) -> i64 {
        self.credit_limit - self.credits_used
    }
}

/// Tax identity of a client; a client has one or more, exactly one of
/// which is the default.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ClientTaxProfile {
    pub tax_profile_id: Uuid,
    pub client_profile_id: Uuid,
    pub name: String,
    pub tax_id: String,
    pub taxpayer: String,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub cfdi_use: Option<String>,
    pub fiscal_regimen: Option<String>,
    pub is_default: bool,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
}
