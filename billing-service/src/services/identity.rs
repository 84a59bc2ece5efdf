//! Identity adapter: maps an authenticated external identity to the
//! internal account record, creating it on first sight.

use crate::middleware::ExternalIdentity;
use crate::models::Account;
use crate::services::Database;
use service_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;

impl Database {
    /// Find or create the account for an external identity. One account
    /// per external id; concurrent first-sight syncs collapse onto the
    /// same row via the unique index.
    #[instrument(skip(self, ident), fields(external_id = %ident.external_id))]
    pub async fn sync_account(&self, ident: &ExternalIdentity) -> Result<Account, AppError> {
        if let Some(account) = self.find_account_by_external_id(&ident.external_id).await? {
            return Ok(account);
        }

        let inserted = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (account_id, external_id, email, name, phone)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (external_id) DO NOTHING
            RETURNING account_id, external_id, email, name, phone, created_utc, updated_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&ident.external_id)
        .bind(&ident.email)
        .bind(&ident.name)
        .bind(&ident.phone)
        .fetch_optional(self.pool())
        .await?;

        match inserted {
            Some(account) => {
                info!(account_id = %account.account_id, "Account created");
                Ok(account)
            }
            // Lost the insert race; the winner's row is what we want.
            None => self
                .find_account_by_external_id(&ident.external_id)
                .await?
                .ok_or_else(|| {
                    AppError::InternalError(anyhow::anyhow!("account vanished after insert race"))
                }),
        }
    }

    pub async fn find_account_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT account_id, external_id, email, name, phone, created_utc, updated_utc
            FROM accounts
            WHERE external_id = $1
            "#,
        )
        .bind(external_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(account)
    }

    /// Profile edit: phone number only. External id and email belong to
    /// the identity provider and are not editable here.
    #[instrument(skip(self))]
    pub async fn update_phone(&self, account_id: Uuid, phone: &str) -> Result<Account, AppError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET phone = $2, updated_utc = now()
            WHERE account_id = $1
            RETURNING account_id, external_id, email, name, phone, created_utc, updated_utc
            "#,
        )
        .bind(account_id)
        .bind(phone)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Account not found")))?;

        Ok(account)
    }
}
