//! Organization tax identity, 1:1 with the organization.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Structured tax identity. `tax_id` (RFC) is globally unique across all
/// organizations; document issuance requires this row to exist.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TaxProfile {
    pub organization_id: Uuid,
    pub tax_id: String,
    pub taxpayer: String,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub cfdi_use: Option<String>,
    pub fiscal_regimen: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}
