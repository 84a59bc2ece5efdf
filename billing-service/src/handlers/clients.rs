//! Client profile handlers, admin-gated.

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
use crate::models::{ClientProfile, ClientTaxProfile, Role};
use crate::services::database::{ClientTaxData, CreateClientProfile};
use crate::AppState;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ClientTaxPayload {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 12, max = 13, message = "Tax id must be 12-13 characters"))]
    pub tax_id: String,
    #[validate(length(min = 1, max = 255))]
    pub taxpayer: String,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub cfdi_use: Option<String>,
    pub fiscal_regimen: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateClientRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub phone: Option<String>,
    #[validate(range(min = 0, message = "Credit limit cannot be negative"))]
    pub credit_limit: i64,
    #[validate(length(min = 1, message = "At least one tax profile is required"))]
    #[validate(nested)]
    pub tax_profiles: Vec<ClientTaxPayload>,
}

#[derive(Debug, Serialize)]
pub struct ClientResponse {
    #[serde(flatten)]
    pub client: ClientProfile,
    pub tax_profiles: Vec<ClientTaxProfile>,
}

pub async fn create_client(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(organization_id): Path<Uuid>,
    Json(payload): Json<CreateClientRequest>,
) -> Result<(StatusCode, Json<ClientResponse>), AppError> {
    payload.validate()?;

    let account = current_account(&state, &identity).await?;
    state
        .db
        .authorize(account.account_id, organization_id, Some(Role::Admin))
        .await?;

    let input = CreateClientProfile {
        name: payload.name,
        email: payload.email,
        phone: payload.phone,
        credit_limit: payload.credit_limit,
        tax_profiles: payload
            .tax_profiles
            .into_iter()
            .map(|t| ClientTaxData {
                name: t.name,
                tax_id: t.tax_id,
                taxpayer: t.taxpayer,
                country: t.country,
                postal_code: t.postal_code,
                cfdi_use: t.cfdi_use,
                fiscal_regimen: t.fiscal_regimen,
            })
            .collect(),
    };

    let (client, tax_profiles) = state
        .db
        .create_client_profile(organization_id, &input)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ClientResponse {
            client,
            tax_profiles,
        }),
    ))
}

pub async fn list_clients(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(organization_id): Path<Uuid>,
) -> Result<Json<Vec<ClientResponse>>, AppError> {
    let account = current_account(&state, &identity).await?;
    state
        .db
        .authorize(account.account_id, organization_id, Some(Role::Admin))
        .await?;

    let clients = state
        .db
        .list_client_profiles(organization_id)
        .await?
        .into_iter()
        .map(|(client, tax_profiles)| ClientResponse {
            client,
            tax_profiles,
        })
        .collect();
    Ok(Json(clients))
}
