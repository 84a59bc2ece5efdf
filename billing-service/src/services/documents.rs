//! Document issuance: builds an immutable snapshot and debits the
//! ledger in the same transaction, so a rejected debit leaves no
//! document row behind.

use crate::models::{
    ClientProfile, ClientTaxProfile, Document, DocumentSnapshot, PartySnapshot, TaxProfile,
};
use crate::services::{ledger, metrics, Database};
use chrono::{Duration, Utc};
use rand::Rng;
use serde::Deserialize;
use service_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;

const DEFAULT_SUBTOTAL: f64 = 1000.0;
const IVA_RATE: f64 = 0.16;
const DUE_DAYS: i64 = 30;

/// Caller-supplied overrides for client-side issuance. Everything is
/// optional; defaults mirror self-issuance.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueOptions {
    pub description: Option<String>,
    pub subtotal: Option<f64>,
}

fn document_number() -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1000);
    format!("INV-{}-{:03}", Utc::now().timestamp_millis(), suffix)
}

fn issuer_party(tax: &TaxProfile) -> PartySnapshot {
    PartySnapshot {
        tax_id: tax.tax_id.clone(),
        taxpayer: tax.taxpayer.clone(),
        address: format!(
            "{}, {}",
            tax.postal_code.as_deref().unwrap_or(""),
            tax.country.as_deref().unwrap_or("")
        ),
        fiscal_regimen: tax.fiscal_regimen.clone(),
        cfdi_use: None,
    }
}

fn build_snapshot(
    issuer: PartySnapshot,
    recipient: Option<PartySnapshot>,
    client_name: Option<String>,
    description: String,
    subtotal: f64,
) -> DocumentSnapshot {
    let now = Utc::now();
    let tax_amount = subtotal * IVA_RATE;
    DocumentSnapshot {
        number: document_number(),
        issue_date: now,
        due_date: now + Duration::days(DUE_DAYS),
        currency: "MXN".to_string(),
        subtotal,
        tax_amount,
        total_amount: subtotal + tax_amount,
        description,
        issuer,
        recipient,
        client_name,
    }
}

impl Database {
    /// Self-issuance by an organization member. The recipient is a fixed
    /// sample party; only the issuer side carries real tax identity.
    #[instrument(skip(self), fields(organization_id = %organization_id))]
    pub async fn issue_document(
        &self,
        organization_id: Uuid,
        account_id: Uuid,
    ) -> Result<(Document, i64), AppError> {
        let tax = self.get_tax_profile(organization_id).await?.ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!(
                "Tax information not configured. Please update your tax information first."
            ))
        })?;

        let sample_recipient = PartySnapshot {
            tax_id: "XAXX010101000".to_string(),
            taxpayer: "Cliente Ejemplo S.A. de C.V.".to_string(),
            address: "Calle Ejemplo #123, Col. Centro, Ciudad de México, CP 01000".to_string(),
            fiscal_regimen: None,
            cfdi_use: Some("G03".to_string()),
        };

        let snapshot = build_snapshot(
            issuer_party(&tax),
            Some(sample_recipient),
            None,
            "Servicios de ejemplo - Factura generada automáticamente".to_string(),
            DEFAULT_SUBTOTAL,
        );

        let mut tx = self.pool().begin().await?;

        let document = sqlx::query_as::<_, Document>(
            r#"
            INSERT INTO documents
                (document_id, organization_id, created_by_account, status, snapshot, created_utc)
            VALUES ($1, $2, $3, 'generated', $4, NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(organization_id)
        .bind(account_id)
        .bind(serde_json::to_value(&snapshot).map_err(anyhow::Error::new)?)
        .fetch_one(&mut *tx)
        .await?;

        let remaining = ledger::debit(&mut tx, organization_id, 1, None).await?;
        tx.commit().await?;

        metrics::DOCUMENTS_ISSUED_TOTAL.inc();
        info!(document_id = %document.document_id, remaining_credits = remaining, "Document issued");
        Ok((document, remaining))
    }

    /// Issuance on behalf of a client profile. Consumes one unit of the
    /// client's sub-limit and one organization credit, atomically with
    /// the document insert.
    #[instrument(skip(self, opts), fields(organization_id = %organization_id, client_profile_id = %client_profile_id))]
    pub async fn issue_document_for_client(
        &self,
        organization_id: Uuid,
        client_profile_id: Uuid,
        tax_profile_id: Uuid,
        opts: IssueOptions,
    ) -> Result<(Document, i64), AppError> {
        let client: ClientProfile = self
            .get_client_profile(organization_id, client_profile_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client profile not found")))?;

        if !client.is_active {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Client profile is inactive"
            )));
        }

        let client_tax = sqlx::query_as::<_, ClientTaxProfile>(
            r#"
            SELECT * FROM client_tax_profiles
            WHERE tax_profile_id = $1 AND client_profile_id = $2 AND is_active = TRUE
            "#,
        )
        .bind(tax_profile_id)
        .bind(client_profile_id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Tax profile not found or inactive")))?;

        let org_tax = self.get_tax_profile(organization_id).await?.ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!(
                "Organization tax information not configured"
            ))
        })?;

        let recipient = PartySnapshot {
            tax_id: client_tax.tax_id.clone(),
            taxpayer: client_tax.taxpayer.clone(),
            address: format!(
                "{}, {}",
                client_tax.postal_code.as_deref().unwrap_or(""),
                client_tax.country.as_deref().unwrap_or("")
            ),
            fiscal_regimen: client_tax.fiscal_regimen.clone(),
            cfdi_use: client_tax.cfdi_use.clone(),
        };

        let snapshot = build_snapshot(
            issuer_party(&org_tax),
            Some(recipient),
            Some(client.name.clone()),
            opts.description
                .unwrap_or_else(|| "Servicios profesionales".to_string()),
            opts.subtotal.unwrap_or(DEFAULT_SUBTOTAL),
        );

        let mut tx = self.pool().begin().await?;

        let document = sqlx::query_as::<_, Document>(
            r#"
            INSERT INTO documents
                (document_id, organization_id, created_by_client, status, snapshot, created_utc)
            VALUES ($1, $2, $3, 'generated', $4, NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(organization_id)
        .bind(client_profile_id)
        .bind(serde_json::to_value(&snapshot).map_err(anyhow::Error::new)?)
        .fetch_one(&mut *tx)
        .await?;

        let remaining = ledger::debit(&mut tx, organization_id, 1, Some(client_profile_id)).await?;
        tx.commit().await?;

        metrics::DOCUMENTS_ISSUED_TOTAL.inc();
        info!(document_id = %document.document_id, remaining_credits = remaining, "Document issued for client");
        Ok((document, remaining))
    }

    pub async fn list_documents(&self, organization_id: Uuid) -> Result<Vec<Document>, AppError> {
        let documents = sqlx::query_as::<_, Document>(
            "SELECT * FROM documents WHERE organization_id = $1 ORDER BY created_utc DESC",
        )
        .bind(organization_id)
        .fetch_all(self.pool())
        .await?;
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_number_shape() {
        let n = document_number();
        let parts: Vec<&str> = n.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "INV");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 3);
        assert!(parts[2].parse::<u32>().unwrap() < 1000);
    }

    #[test]
    fn snapshot_applies_iva() {
        let issuer = PartySnapshot {
            tax_id: "AAA010101AAA".into(),
            taxpayer: "Empresa SA".into(),
            address: "01000, México".into(),
            fiscal_regimen: Some("601".into()),
            cfdi_use: None,
        };
        let s = build_snapshot(issuer, None, None, "x".into(), 1000.0);
        assert_eq!(s.currency, "MXN");
        assert!((s.tax_amount - 160.0).abs() < f64::EPSILON);
        assert!((s.total_amount - 1160.0).abs() < f64::EPSILON);
        assert_eq!(s.due_date - s.issue_date, Duration::days(30));
    }
}
