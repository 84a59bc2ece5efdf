//! Tenancy directory: membership lookups, the authorization gate every
//! ledger/document/invitation call passes through, and member removal
//! with the last-admin guard.

use crate::models::{Membership, Role};
use crate::services::Database;
use service_core::error::AppError;
use sqlx::FromRow;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Projection row for member listings.
#[derive(Debug, Clone, serde::Serialize, FromRow)]
pub struct MemberRow {
    pub account_id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub role: String,
    pub joined_utc: chrono::DateTime<chrono::Utc>,
}

impl Database {
    /// The mandatory authorization gate. Succeeds only when a membership
    /// row exists and (if given) the role requirement is met. The caller
    /// never supplies its own role; the stored row is authoritative.
    #[instrument(skip(self), fields(account_id = %account_id, organization_id = %organization_id))]
    pub async fn authorize(
        &self,
        account_id: Uuid,
        organization_id: Uuid,
        required: Option<Role>,
    ) -> Result<Membership, AppError> {
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            SELECT account_id, organization_id, role, created_utc
            FROM memberships
            WHERE account_id = $1 AND organization_id = $2
            "#,
        )
        .bind(account_id)
        .bind(organization_id)
        .fetch_optional(self.pool())
        .await?;

        let membership = membership.ok_or_else(|| {
            warn!("authorization denied: no membership");
            AppError::Forbidden(anyhow::anyhow!("Organization not found or access denied"))
        })?;

        if let Some(required) = required {
            if !membership.role().satisfies(required) {
                warn!(role = %membership.role, required = required.as_str(), "authorization denied: insufficient role");
                return Err(AppError::Forbidden(anyhow::anyhow!(
                    "{} access required",
                    required.as_str()
                )));
            }
        }

        Ok(membership)
    }

    pub async fn list_members(&self, organization_id: Uuid) -> Result<Vec<MemberRow>, AppError> {
        let members = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT a.account_id, a.email, a.name, a.phone, m.role, m.created_utc AS joined_utc
            FROM memberships m
            JOIN accounts a ON a.account_id = m.account_id
            WHERE m.organization_id = $1
            ORDER BY m.created_utc
            "#,
        )
        .bind(organization_id)
        .fetch_all(self.pool())
        .await?;

        Ok(members)
    }

    /// Whether an email already maps to a member of the organization.
    pub async fn member_email_exists(
        &self,
        organization_id: Uuid,
        email: &str,
    ) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM memberships m
                JOIN accounts a ON a.account_id = m.account_id
                WHERE m.organization_id = $1 AND lower(a.email) = lower($2)
            )
            "#,
        )
        .bind(organization_id)
        .bind(email)
        .fetch_one(self.pool())
        .await?;

        Ok(exists)
    }

    /// Remove a member. Fails with Conflict when the target is the sole
    /// admin: every organization keeps at least one admin. The
    /// membership rows are locked so two concurrent removals cannot both
    /// see a second admin that the other is deleting.
    #[instrument(skip(self), fields(organization_id = %organization_id, target = %target_account_id))]
    pub async fn remove_member(
        &self,
        organization_id: Uuid,
        target_account_id: Uuid,
    ) -> Result<(), AppError> {
        let mut tx = self.pool().begin().await?;

        let rows = sqlx::query_as::<_, Membership>(
            r#"
            SELECT account_id, organization_id, role, created_utc
            FROM memberships
            WHERE organization_id = $1
            FOR UPDATE
            "#,
        )
        .bind(organization_id)
        .fetch_all(&mut *tx)
        .await?;

        let target = rows
            .iter()
            .find(|m| m.account_id == target_account_id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Member not found")))?;

        if target.role() == Role::Admin {
            let admin_count = rows.iter().filter(|m| m.role() == Role::Admin).count();
            if admin_count <= 1 {
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "Cannot remove the last admin of the organization"
                )));
            }
        }

        sqlx::query(
            r#"
            DELETE FROM memberships
            WHERE organization_id = $1 AND account_id = $2
            "#,
        )
        .bind(organization_id)
        .bind(target_account_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!("Member removed");
        Ok(())
    }
}
