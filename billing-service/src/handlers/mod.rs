//! HTTP handlers.

pub mod billing;
pub mod clients;
pub mod documents;
pub mod invitations;
pub mod members;
pub mod organizations;
pub mod profile;
pub mod webhook;

use axum::{extract::State, http::StatusCode, Json};
use serde_json::json;
use service_core::error::AppError;
use service_core::middleware::metrics::render_metrics;

use crate::middleware::ExternalIdentity;
use crate::models::Account;
use crate::AppState;

/// Health check: verifies database connectivity.
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.db.health_check().await?;
    Ok(Json(json!({
        "status": "healthy",
        "service": "billing-service",
    })))
}

/// Prometheus scrape endpoint.
pub async fn metrics() -> (StatusCode, String) {
    (StatusCode::OK, render_metrics())
}

/// Resolve the caller's local account. Callers must have synced at least
/// once; authentication alone does not create local state.
pub(crate) async fn current_account(
    state: &AppState,
    identity: &ExternalIdentity,
) -> Result<Account, AppError> {
    state
        .db
        .find_account_by_external_id(&identity.external_id)
        .await?
        .ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Account not registered; sync first"))
        })
}
