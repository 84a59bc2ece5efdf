//! Credit ledger: atomic debit/credit on an organization's balance and
//! per-client sub-limits.
//!
//! The insufficient-credit check must happen under the same row lock as
//! the decrement, so both are a single conditional UPDATE; the balance
//! can never go negative even under concurrent callers. The free
//! functions operate on a caller-supplied connection so document
//! issuance and event reconciliation can fold a ledger movement into
//! their own transaction.

use crate::services::Database;
use service_core::error::AppError;
use sqlx::PgConnection;
use tracing::{info, instrument};
use uuid::Uuid;

/// Debit `amount` credits from the organization, and when a client
/// profile is given, consume the same amount of its sub-limit. Rejects
/// with Conflict and no effect at all when either check fails; the
/// caller's transaction rollback discards any partial write.
pub async fn debit(
    conn: &mut PgConnection,
    organization_id: Uuid,
    amount: i64,
    client_profile_id: Option<Uuid>,
) -> Result<i64, AppError> {
    if amount <= 0 {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Debit amount must be positive"
        )));
    }

    if let Some(client_id) = client_profile_id {
        let used = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE client_profiles
            SET credits_used = credits_used + $3
            WHERE client_profile_id = $1
              AND organization_id = $2
              AND credits_used + $3 <= credit_limit
            RETURNING credits_used
            "#,
        )
        .bind(client_id)
        .bind(organization_id)
        .bind(amount)
        .fetch_optional(&mut *conn)
        .await?;

        if used.is_none() {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Client has exceeded credit limit"
            )));
        }
    }

    let new_balance = sqlx::query_scalar::<_, i64>(
        r#"
        UPDATE organizations
        SET credit_balance = credit_balance - $2
        WHERE organization_id = $1 AND credit_balance >= $2
        RETURNING credit_balance
        "#,
    )
    .bind(organization_id)
    .bind(amount)
    .fetch_optional(&mut *conn)
    .await?;

    match new_balance {
        Some(balance) => Ok(balance),
        None => {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM organizations WHERE organization_id = $1)",
            )
            .bind(organization_id)
            .fetch_one(&mut *conn)
            .await?;

            if exists {
                Err(AppError::Conflict(anyhow::anyhow!("Insufficient credits")))
            } else {
                Err(AppError::NotFound(anyhow::anyhow!("Organization not found")))
            }
        }
    }
}

/// Credit `amount` to the organization. No upper bound; idempotence of
/// repeated grants is the reconciler's event-dedup concern, not the
/// ledger's.
pub async fn credit(
    conn: &mut PgConnection,
    organization_id: Uuid,
    amount: i64,
) -> Result<i64, AppError> {
    if amount <= 0 {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Credit amount must be positive"
        )));
    }

    let new_balance = sqlx::query_scalar::<_, i64>(
        r#"
        UPDATE organizations
        SET credit_balance = credit_balance + $2
        WHERE organization_id = $1
        RETURNING credit_balance
        "#,
    )
    .bind(organization_id)
    .bind(amount)
    .fetch_optional(&mut *conn)
    .await?;

    new_balance.ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Organization not found")))
}

impl Database {
    /// Standalone debit in its own transaction.
    #[instrument(skip(self), fields(organization_id = %organization_id, amount = amount))]
    pub async fn debit(
        &self,
        organization_id: Uuid,
        amount: i64,
        client_profile_id: Option<Uuid>,
    ) -> Result<i64, AppError> {
        let mut tx = self.pool().begin().await?;
        let balance = debit(&mut tx, organization_id, amount, client_profile_id).await?;
        tx.commit().await?;

        info!(new_balance = balance, "Credits debited");
        Ok(balance)
    }

    /// Standalone credit in its own transaction.
    #[instrument(skip(self), fields(organization_id = %organization_id, amount = amount))]
    pub async fn credit(&self, organization_id: Uuid, amount: i64) -> Result<i64, AppError> {
        let mut tx = self.pool().begin().await?;
        let balance = credit(&mut tx, organization_id, amount).await?;
        tx.commit().await?;

        info!(new_balance = balance, "Credits granted");
        Ok(balance)
    }

    pub async fn get_balance(&self, organization_id: Uuid) -> Result<i64, AppError> {
        let balance = sqlx::query_scalar::<_, i64>(
            "SELECT credit_balance FROM organizations WHERE organization_id = $1",
        )
        .bind(organization_id)
        .fetch_optional(self.pool())
        .await?;

        balance.ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Organization not found")))
    }
}
