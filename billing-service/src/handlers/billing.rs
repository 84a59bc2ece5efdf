//! Plan listing, checkout and billing-portal handlers.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;

use crate::handlers::current_account;
use crate::middleware::AuthUser;
use crate::models::{Plan, Role};
use crate::AppState;

pub async fn list_plans(State(state): State<AppState>) -> Json<Vec<Plan>> {
    Json(state.config.plan_catalog().plans().to_vec())
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub organization_id: Uuid,
    pub price_id: String,
}

#[derive(Debug, Serialize)]
pub struct RedirectResponse {
    pub url: String,
}

/// Start a subscription checkout. The session carries the organization
/// id in metadata; completion comes back through the webhook.
pub async fn create_checkout(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Json<RedirectResponse>, AppError> {
    let account = current_account(&state, &identity).await?;
    state
        .db
        .authorize(account.account_id, payload.organization_id, Some(Role::Admin))
        .await?;

    if !state.config.plan_catalog().is_known_price(&payload.price_id) {
        return Err(AppError::BadRequest(anyhow::anyhow!("Unknown price id")));
    }

    let organization = state
        .db
        .get_organization(payload.organization_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Organization not found")))?;

    let existing = state.db.get_subscription(payload.organization_id).await?;
    if existing.as_ref().is_some_and(|s| s.is_active()) {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Organization already has an active subscription"
        )));
    }

    // Reuse the provider customer from a past subscription if one exists.
    let customer_id = match existing {
        Some(sub) => sub.provider_customer_id,
        None => {
            state
                .stripe
                .create_customer(&account.email, &organization.name, organization.organization_id)
                .await?
                .id
        }
    };

    let session = state
        .stripe
        .create_checkout_session(
            &customer_id,
            &payload.price_id,
            payload.organization_id,
            &format!("{}/dashboard?checkout=success", state.config.app_url),
            &format!("{}/dashboard?checkout=canceled", state.config.app_url),
        )
        .await?;

    let url = session.url.ok_or_else(|| {
        AppError::BadGateway("Checkout session has no redirect url".to_string())
    })?;
    Ok(Json(RedirectResponse { url }))
}

#[derive(Debug, Deserialize)]
pub struct PortalRequest {
    pub organization_id: Uuid,
}

pub async fn create_portal(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(payload): Json<PortalRequest>,
) -> Result<Json<RedirectResponse>, AppError> {
    let account = current_account(&state, &identity).await?;
    state
        .db
        .authorize(account.account_id, payload.organization_id, Some(Role::Admin))
        .await?;

    let subscription = state
        .db
        .get_subscription(payload.organization_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("No subscription for organization")))?;

    let session = state
        .stripe
        .create_portal_session(
            &subscription.provider_customer_id,
            &format!("{}/dashboard", state.config.app_url),
        )
        .await?;
    Ok(Json(RedirectResponse { url: session.url }))
}
