//! Organization creation, listing and tax-profile handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::handlers::current_account;
use crate::middleware::AuthUser;
use crate::models::{Organization, OrganizationType, Role, TaxProfile};
use crate::services::database::{CreateOrganization, OrganizationForAccount, TaxData};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct TaxPayload {
    #[validate(length(min = 12, max = 13, message = "Tax id must be 12-13 characters"))]
    pub tax_id: String,
    #[validate(length(min = 1, max = 255))]
    pub taxpayer: String,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub cfdi_use: Option<String>,
    pub fiscal_regimen: Option<String>,
}

impl TaxPayload {
    fn into_tax_data(self) -> TaxData {
        TaxData {
            tax_id: self.tax_id.trim().to_uppercase(),
            taxpayer: self.taxpayer.trim().to_string(),
            country: self.country,
            postal_code: self.postal_code,
            cfdi_use: self.cfdi_use,
            fiscal_regimen: self.fiscal_regimen,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrganizationRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,
    /// "individual", "legal_entity" or "agency".
    pub organization_type: String,
    #[validate(nested)]
    pub tax: TaxPayload,
}

#[derive(Debug, Serialize)]
pub struct OrganizationResponse {
    #[serde(flatten)]
    pub organization: Organization,
    pub tax_profile: TaxProfile,
}

pub async fn create_organization(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(payload): Json<CreateOrganizationRequest>,
) -> Result<(StatusCode, Json<OrganizationResponse>), AppError> {
    payload.validate()?;

    let account = current_account(&state, &identity).await?;
    let input = CreateOrganization {
        name: payload.name.trim().to_string(),
        organization_type: OrganizationType::from_str(&payload.organization_type),
        is_personal: false,
        tax: payload.tax.into_tax_data(),
    };

    let (organization, tax_profile) = state.db.create_organization(account.account_id, &input).await?;
    Ok((
        StatusCode::CREATED,
        Json(OrganizationResponse {
            organization,
            tax_profile,
        }),
    ))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePersonalOrganizationRequest {
    /// Defaults to the caller's display name.
    #[validate(length(max = 200))]
    pub name: Option<String>,
    #[validate(nested)]
    pub tax: TaxPayload,
}

/// Personal workspace for an individual; one member, individual type.
pub async fn create_personal_organization(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(payload): Json<CreatePersonalOrganizationRequest>,
) -> Result<(StatusCode, Json<OrganizationResponse>), AppError> {
    payload.validate()?;

    let account = current_account(&state, &identity).await?;
    let name = payload
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| {
            account
                .name
                .clone()
                .unwrap_or_else(|| account.email.clone())
        });

    let input = CreateOrganization {
        name: name.trim().to_string(),
        organization_type: OrganizationType::Individual,
        is_personal: true,
        tax: payload.tax.into_tax_data(),
    };

    let (organization, tax_profile) = state.db.create_organization(account.account_id, &input).await?;
    Ok((
        StatusCode::CREATED,
        Json(OrganizationResponse {
            organization,
            tax_profile,
        }),
    ))
}

pub async fn list_organizations(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<Json<Vec<OrganizationForAccount>>, AppError> {
    let account = current_account(&state, &identity).await?;
    let organizations = state.db.list_organizations_for(account.account_id).await?;
    Ok(Json(organizations))
}

pub async fn get_tax_profile(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(organization_id): Path<Uuid>,
) -> Result<Json<TaxProfile>, AppError> {
    let account = current_account(&state, &identity).await?;
    state
        .db
        .authorize(account.account_id, organization_id, None)
        .await?;

    let tax = state
        .db
        .get_tax_profile(organization_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Tax profile not found")))?;
    Ok(Json(tax))
}

pub async fn update_tax_profile(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(organization_id): Path<Uuid>,
    Json(payload): Json<TaxPayload>,
) -> Result<Json<TaxProfile>, AppError> {
    payload.validate()?;

    let account = current_account(&state, &identity).await?;
    state
        .db
        .authorize(account.account_id, organization_id, Some(Role::Admin))
        .await?;

    let updated = state
        .db
        .update_tax_profile(organization_id, &payload.into_tax_data())
        .await?;
    Ok(Json(updated))
}
