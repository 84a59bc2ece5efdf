//! Database service: connection pool plus organization, tax-profile and
//! client-profile persistence. Domain-specific operations (ledger,
//! reconciler, invitations, documents, tenancy) extend this type from
//! their own modules.

use crate::models::{
    Account, ClientProfile, ClientTaxProfile, Organization, OrganizationType, Role, Subscription,
    TaxProfile,
};
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Database connection pool wrapper. The store is the only shared
/// resource between request workers; no balance or membership data is
/// cached in process.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

/// Input for organization creation; tax data is mandatory because
/// document issuance requires a configured tax identity.
#[derive(Debug, Clone)]
pub struct CreateOrganization {
    pub name: String,
    pub organization_type: OrganizationType,
    pub is_personal: bool,
    pub tax: TaxData,
}

#[derive(Debug, Clone)]
pub struct TaxData {
    pub tax_id: String,
    pub taxpayer: String,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub cfdi_use: Option<String>,
    pub fiscal_regimen: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateClientProfile {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub credit_limit: i64,
    pub tax_profiles: Vec<ClientTaxData>,
}

#[derive(Debug, Clone)]
pub struct ClientTaxData {
    pub name: String,
    pub tax_id: String,
    pub taxpayer: String,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub cfdi_use: Option<String>,
    pub fiscal_regimen: Option<String>,
}

/// An organization joined with the caller's role in it.
#[derive(Debug, Clone, serde::Serialize, FromRow)]
pub struct OrganizationForAccount {
    pub organization_id: Uuid,
    pub name: String,
    pub organization_type: String,
    pub is_personal: bool,
    pub credit_balance: i64,
    pub created_utc: chrono::DateTime<chrono::Utc>,
    pub role: String,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "billing-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Organization operations
    // -------------------------------------------------------------------------

    /// Create an organization, its founding admin membership and its tax
    /// profile in one transaction. The tax id is globally unique; a taken
    /// one rejects the whole creation.
    #[instrument(skip(self, input), fields(account_id = %founder, org_name = %input.name))]
    pub async fn create_organization(
        &self,
        founder: Uuid,
        input: &CreateOrganization,
    ) -> Result<(Organization, TaxProfile), AppError> {
        let mut tx = self.pool.begin().await?;

        let organization_id = Uuid::new_v4();
        let organization = sqlx::query_as::<_, Organization>(
            r#"
            INSERT INTO organizations (organization_id, name, organization_type, is_personal)
            VALUES ($1, $2, $3, $4)
            RETURNING organization_id, name, organization_type, is_personal, credit_balance, created_utc
            "#,
        )
        .bind(organization_id)
        .bind(&input.name)
        .bind(input.organization_type.as_str())
        .bind(input.is_personal)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO memberships (account_id, organization_id, role)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(founder)
        .bind(organization_id)
        .bind(Role::Admin.as_str())
        .execute(&mut *tx)
        .await?;

        let tax = sqlx::query_as::<_, TaxProfile>(
            r#"
            INSERT INTO tax_profiles (organization_id, tax_id, taxpayer, country, postal_code, cfdi_use, fiscal_regimen)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING organization_id, tax_id, taxpayer, country, postal_code, cfdi_use, fiscal_regimen, created_utc, updated_utc
            "#,
        )
        .bind(organization_id)
        .bind(&input.tax.tax_id)
        .bind(&input.tax.taxpayer)
        .bind(&input.tax.country)
        .bind(&input.tax.postal_code)
        .bind(&input.tax.cfdi_use)
        .bind(&input.tax.fiscal_regimen)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Tax id '{}' is already registered to another organization",
                    input.tax.tax_id
                ))
            }
            _ => e.into(),
        })?;

        tx.commit().await?;

        info!(
            organization_id = %organization.organization_id,
            organization_type = %organization.organization_type,
            "Organization created"
        );

        Ok((organization, tax))
    }

    pub async fn get_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Option<Organization>, AppError> {
        let organization = sqlx::query_as::<_, Organization>(
            r#"
            SELECT organization_id, name, organization_type, is_personal, credit_balance, created_utc
            FROM organizations
            WHERE organization_id = $1
            "#,
        )
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(organization)
    }

    /// All organizations the account belongs to, with its role in each.
    pub async fn list_organizations_for(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<OrganizationForAccount>, AppError> {
        let rows = sqlx::query_as::<_, OrganizationForAccount>(
            r#"
            SELECT o.organization_id, o.name, o.organization_type, o.is_personal,
                   o.credit_balance, o.created_utc, m.role
            FROM organizations o
            JOIN memberships m ON m.organization_id = o.organization_id
            WHERE m.account_id = $1
            ORDER BY o.created_utc
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // -------------------------------------------------------------------------
    // Tax profile operations
    // -------------------------------------------------------------------------

    pub async fn get_tax_profile(
        &self,
        organization_id: Uuid,
    ) -> Result<Option<TaxProfile>, AppError> {
        let tax = sqlx::query_as::<_, TaxProfile>(
            r#"
            SELECT organization_id, tax_id, taxpayer, country, postal_code, cfdi_use, fiscal_regimen, created_utc, updated_utc
            FROM tax_profiles
            WHERE organization_id = $1
            "#,
        )
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tax)
    }

    pub async fn update_tax_profile(
        &self,
        organization_id: Uuid,
        tax: &TaxData,
    ) -> Result<TaxProfile, AppError> {
        let updated = sqlx::query_as::<_, TaxProfile>(
            r#"
            UPDATE tax_profiles
            SET tax_id = $2, taxpayer = $3, country = $4, postal_code = $5,
                cfdi_use = $6, fiscal_regimen = $7, updated_utc = now()
            WHERE organization_id = $1
            RETURNING organization_id, tax_id, taxpayer, country, postal_code, cfdi_use, fiscal_regimen, created_utc, updated_utc
            "#,
        )
        .bind(organization_id)
        .bind(&tax.tax_id)
        .bind(&tax.taxpayer)
        .bind(&tax.country)
        .bind(&tax.postal_code)
        .bind(&tax.cfdi_use)
        .bind(&tax.fiscal_regimen)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Tax id '{}' is already registered to another organization",
                    tax.tax_id
                ))
            }
            _ => e.into(),
        })?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Tax profile not found")))?;

        Ok(updated)
    }

    // -------------------------------------------------------------------------
    // Client profile operations
    // -------------------------------------------------------------------------

    /// Create a client profile and its tax profiles in one transaction;
    /// the first tax profile becomes the default.
    #[instrument(skip(self, input), fields(organization_id = %organization_id, client_name = %input.name))]
    pub async fn create_client_profile(
        &self,
        organization_id: Uuid,
        input: &CreateClientProfile,
    ) -> Result<(ClientProfile, Vec<ClientTaxProfile>), AppError> {
        if input.tax_profiles.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "At least one tax profile is required"
            )));
        }

        let mut tx = self.pool.begin().await?;

        let client = sqlx::query_as::<_, ClientProfile>(
            r#"
            INSERT INTO client_profiles (client_profile_id, organization_id, name, email, phone, credit_limit)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING client_profile_id, organization_id, name, email, phone, credit_limit, credits_used, is_active, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(organization_id)
        .bind(input.name.trim())
        .bind(input.email.trim().to_lowercase())
        .bind(input.phone.as_deref().map(str::trim))
        .bind(input.credit_limit)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Client email address already exists"))
            }
            _ => e.into(),
        })?;

        let mut created_tax = Vec::with_capacity(input.tax_profiles.len());
        for (i, tax) in input.tax_profiles.iter().enumerate() {
            let row = sqlx::query_as::<_, ClientTaxProfile>(
                r#"
                INSERT INTO client_tax_profiles
                    (tax_profile_id, client_profile_id, name, tax_id, taxpayer, country, postal_code, cfdi_use, fiscal_regimen, is_default)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                RETURNING tax_profile_id, client_profile_id, name, tax_id, taxpayer, country, postal_code, cfdi_use, fiscal_regimen, is_default, is_active, created_utc
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(client.client_profile_id)
            .bind(tax.name.trim())
            .bind(tax.tax_id.trim().to_uppercase())
            .bind(tax.taxpayer.trim())
            .bind(&tax.country)
            .bind(&tax.postal_code)
            .bind(&tax.cfdi_use)
            .bind(&tax.fiscal_regimen)
            .bind(i == 0)
            .fetch_one(&mut *tx)
            .await?;

            created_tax.push(row);
        }

        tx.commit().await?;

        info!(
            client_profile_id = %client.client_profile_id,
            tax_profiles = created_tax.len(),
            "Client profile created"
        );

        Ok((client, created_tax))
    }

    pub async fn list_client_profiles(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<(ClientProfile, Vec<ClientTaxProfile>)>, AppError> {
        let clients = sqlx::query_as::<_, ClientProfile>(
            r#"
            SELECT client_profile_id, organization_id, name, email, phone, credit_limit, credits_used, is_active, created_utc
            FROM client_profiles
            WHERE organization_id = $1
            ORDER BY created_utc DESC
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        let mut result = Vec::with_capacity(clients.len());
        for client in clients {
            let tax = sqlx::query_as::<_, ClientTaxProfile>(
                r#"
                SELECT tax_profile_id, client_profile_id, name, tax_id, taxpayer, country, postal_code, cfdi_use, fiscal_regimen, is_default, is_active, created_utc
                FROM client_tax_profiles
                WHERE client_profile_id = $1 AND is_active
                ORDER BY is_default DESC, created_utc
                "#,
            )
            .bind(client.client_profile_id)
            .fetch_all(&self.pool)
            .await?;

            result.push((client, tax));
        }

        Ok(result)
    }

    pub async fn get_client_profile(
        &self,
        organization_id: Uuid,
        client_profile_id: Uuid,
    ) -> Result<Option<ClientProfile>, AppError> {
        let client = sqlx::query_as::<_, ClientProfile>(
            r#"
            SELECT client_profile_id, organization_id, name, email, phone, credit_limit, credits_used, is_active, created_utc
            FROM client_profiles
            WHERE organization_id = $1 AND client_profile_id = $2
            "#,
        )
        .bind(organization_id)
        .bind(client_profile_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(client)
    }

    // -------------------------------------------------------------------------
    // Subscription reads (writes belong to the reconciler)
    // -------------------------------------------------------------------------

    pub async fn get_subscription(
        &self,
        organization_id: Uuid,
    ) -> Result<Option<Subscription>, AppError> {
        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            SELECT organization_id, provider_customer_id, provider_subscription_id, status, plan_type, current_period_end, created_utc, updated_utc
            FROM subscriptions
            WHERE organization_id = $1
            "#,
        )
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subscription)
    }

    pub async fn get_account(&self, account_id: Uuid) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT account_id, external_id, email, name, phone, created_utc, updated_utc
            FROM accounts
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }
}
