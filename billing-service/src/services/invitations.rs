//! Invitation lifecycle: issue, validate, accept.
//!
//! The token is the sole acceptance credential, so it is generated from
//! the OS entropy source and never logged. Acceptance locks the
//! invitation row, making the token single-use even under concurrent
//! submits.

use crate::models::{Account, Invitation, InvitationStatus, Membership, Role};
use crate::services::{metrics, Database};
use chrono::{Duration, Utc};
use hex::ToHex;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;
use service_core::error::AppError;
use sqlx::FromRow;
use tracing::{info, instrument};
use uuid::Uuid;

/// Display data returned to an invitee before they sign in. Carries no
/// token and nothing an outsider could not be shown.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InvitationPreview {
    pub organization_id: Uuid,
    pub organization_name: String,
    pub invitee_email: String,
    pub invited_by_name: String,
    pub expires_utc: chrono::DateTime<Utc>,
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    bytes.encode_hex::<String>()
}

impl Database {
    #[instrument(skip(self, invitee_email), fields(organization_id = %organization_id))]
    pub async fn issue_invitation(
        &self,
        organization_id: Uuid,
        invited_by: Uuid,
        invitee_email: &str,
        expiry_days: i64,
    ) -> Result<Invitation, AppError> {
        let email = invitee_email.trim().to_lowercase();

        if self.member_email_exists(organization_id, &email).await? {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "User is already a member of this organization"
            )));
        }

        let pending_exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM invitations
                WHERE organization_id = $1
                  AND LOWER(invitee_email) = $2
                  AND status = 'pending'
                  AND expires_utc > NOW()
            )
            "#,
        )
        .bind(organization_id)
        .bind(&email)
        .fetch_one(self.pool())
        .await?;

        if pending_exists {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "A pending invitation already exists for this email"
            )));
        }

        let invitation = sqlx::query_as::<_, Invitation>(
            r#"
            INSERT INTO invitations
                (invitation_id, organization_id, invited_by, invitee_email,
                 token, status, expires_utc, created_utc)
            VALUES ($1, $2, $3, $4, $5, 'pending', $6, NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(organization_id)
        .bind(invited_by)
        .bind(&email)
        .bind(generate_token())
        .bind(Utc::now() + Duration::days(expiry_days))
        .fetch_one(self.pool())
        .await?;

        info!(invitation_id = %invitation.invitation_id, "Invitation issued");
        Ok(invitation)
    }

    /// Invalid, consumed and expired tokens are indistinguishable to the
    /// caller.
    pub async fn validate_invitation(&self, token: &str) -> Result<InvitationPreview, AppError> {
        let preview = sqlx::query_as::<_, InvitationPreview>(
            r#"
            SELECT i.organization_id,
                   o.name AS organization_name,
                   i.invitee_email,
                   COALESCE(a.name, a.email) AS invited_by_name,
                   i.expires_utc
            FROM invitations i
            JOIN organizations o ON o.organization_id = i.organization_id
            JOIN accounts a ON a.account_id = i.invited_by
            WHERE i.token = $1
              AND i.status = 'pending'
              AND i.expires_utc > NOW()
            "#,
        )
        .bind(token)
        .fetch_optional(self.pool())
        .await?;

        preview.ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("Invitation is invalid or expired"))
        })
    }

    #[instrument(skip(self, token, account), fields(account_id = %account.account_id))]
    pub async fn accept_invitation(
        &self,
        token: &str,
        account: &Account,
    ) -> Result<Membership, AppError> {
        let mut tx = self.pool().begin().await?;

        let invitation = sqlx::query_as::<_, Invitation>(
            "SELECT * FROM invitations WHERE token = $1 FOR UPDATE",
        )
        .bind(token)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invitation is invalid or expired")))?;

        if !invitation.is_pending() || invitation.is_expired(Utc::now()) {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Invitation is invalid or expired"
            )));
        }

        if !invitation.invitee_email.eq_ignore_ascii_case(&account.email) {
            return Err(AppError::Forbidden(anyhow::anyhow!(
                "Invitation was issued to a different email"
            )));
        }

        let membership = sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO memberships (account_id, organization_id, role, created_utc)
            VALUES ($1, $2, $3, NOW())
            RETURNING *
            "#,
        )
        .bind(account.account_id)
        .bind(invitation.organization_id)
        .bind(Role::Member.as_str())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE invitations SET status = $2 WHERE invitation_id = $1")
            .bind(invitation.invitation_id)
            .bind(InvitationStatus::Accepted.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        metrics::INVITATIONS_ACCEPTED_TOTAL.inc();
        info!(
            invitation_id = %invitation.invitation_id,
            organization_id = %invitation.organization_id,
            "Invitation accepted"
        );
        Ok(membership)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tokens_do_not_repeat() {
        assert_ne!(generate_token(), generate_token());
    }
}
