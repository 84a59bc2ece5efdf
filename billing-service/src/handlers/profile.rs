//! Account sync and profile handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use service_core::error::AppError;
use validator::Validate;

use crate::handlers::current_account;
use crate::middleware::AuthUser;
use crate::models::Account;
use crate::AppState;

/// Upsert the caller's local account from their identity token. Must be
/// called once before any organization-scoped operation.
pub async fn sync(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<(StatusCode, Json<Account>), AppError> {
    let account = state.db.sync_account(&identity).await?;
    Ok((StatusCode::OK, Json(account)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePhoneRequest {
    #[validate(length(min = 7, max = 20, message = "Phone must be 7-20 characters"))]
    pub phone: String,
}

pub async fn update_phone(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(payload): Json<UpdatePhoneRequest>,
) -> Result<Json<Account>, AppError> {
    payload.validate()?;

    let account = current_account(&state, &identity).await?;
    let updated = state
        .db
        .update_phone(account.account_id, payload.phone.trim())
        .await?;
    Ok(Json(updated))
}
