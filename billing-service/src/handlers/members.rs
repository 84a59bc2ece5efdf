//! Member listing and removal handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::handlers::current_account;
use crate::middleware::AuthUser;
use crate::models::Role;
use crate::services::tenancy::MemberRow;
use crate::AppState;

pub async fn list_members(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(organization_id): Path<Uuid>,
) -> Result<Json<Vec<MemberRow>>, AppError> {
    let account = current_account(&state, &identity).await?;
    state
        .db
        .authorize(account.account_id, organization_id, Some(Role::Admin))
        .await?;

    let members = state.db.list_members(organization_id).await?;
    Ok(Json(members))
}

/// Remove a member. Rejected with 409 when the target is the last admin;
/// admins may remove themselves otherwise.
pub async fn remove_member(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path((organization_id, target_account_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    let account = current_account(&state, &identity).await?;
    state
        .db
        .authorize(account.account_id, organization_id, Some(Role::Admin))
        .await?;

    state
        .db
        .remove_member(organization_id, target_account_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
