//! Invitation handlers. Issue and accept require authentication;
//! validate is public so an invitee can preview before signing in.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::handlers::current_account;
use crate::middleware::AuthUser;
use crate::models::{Membership, Role};
use crate::services::invitations::InvitationPreview;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvitationRequest {
    pub organization_id: Uuid,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct CreateInvitationResponse {
    pub invitation_id: Uuid,
    pub invitee_email: String,
    pub expires_utc: DateTime<Utc>,
    /// Link for the issuer to forward; delivery is out of scope.
    pub invite_link: String,
}

pub async fn create_invitation(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(payload): Json<CreateInvitationRequest>,
) -> Result<(StatusCode, Json<CreateInvitationResponse>), AppError> {
    payload.validate()?;

    let account = current_account(&state, &identity).await?;
    state
        .db
        .authorize(account.account_id, payload.organization_id, Some(Role::Admin))
        .await?;

    let invitation = state
        .db
        .issue_invitation(
            payload.organization_id,
            account.account_id,
            &payload.email,
            state.config.invitations.expiry_days,
        )
        .await?;

    let invite_link = format!(
        "{}/invitations/accept?token={}",
        state.config.app_url, invitation.token
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateInvitationResponse {
            invitation_id: invitation.invitation_id,
            invitee_email: invitation.invitee_email,
            expires_utc: invitation.expires_utc,
            invite_link,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

pub async fn validate_invitation(
    State(state): State<AppState>,
    Json(payload): Json<TokenRequest>,
) -> Result<Json<InvitationPreview>, AppError> {
    let preview = state.db.validate_invitation(&payload.token).await?;
    Ok(Json(preview))
}

pub async fn accept_invitation(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(payload): Json<TokenRequest>,
) -> Result<Json<Membership>, AppError> {
    // Sync rather than lookup: a brand-new invitee has no local account
    // row yet.
    let account = state.db.sync_account(&identity).await?;
    let membership = state.db.accept_invitation(&payload.token, &account).await?;
    Ok(Json(membership))
}
