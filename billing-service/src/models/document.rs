//! Billing documents and their immutable snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One side of a document: tax identity captured at issuance time.
/// Never re-derived from live rows afterward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartySnapshot {
    pub tax_id: String,
    pub taxpayer: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fiscal_regimen: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cfdi_use: Option<String>,
}

/// The structured body of a billing document. Amounts are illustrative
/// currency values and deliberately a separate numeric domain from the
/// integer credits the ledger tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub number: String,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub currency: String,
    pub subtotal: f64,
    pub tax_amount: f64,
    pub total_amount: f64,
    pub description: String,
    pub issuer: PartySnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<PartySnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
}

/// `generated` is the only status in the current scope.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Document {
    pub document_id: Uuid,
    pub organization_id: Uuid,
    pub created_by_account: Option<Uuid>,
    pub created_by_client: Option<Uuid>,
    pub status: String,
    pub snapshot: serde_json::Value,
    pub created_utc: DateTime<Utc>,
}

impl Document {
    /// Decode the stored snapshot. The snapshot was serialized by this
    /// service, so a decode failure is an internal invariant violation.
    pub fn snapshot(&self) -> Result<DocumentSnapshot, serde_json::Error> {
        serde_json::from_value(self.snapshot.clone())
    }
}
