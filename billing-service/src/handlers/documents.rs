//! Document issuance and listing handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;

use crate::handlers::current_account;
use crate::middleware::AuthUser;
use crate::models::{Document, Role};
use crate::services::documents::IssueOptions;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct IssueDocumentRequest {
    pub organization_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct IssueDocumentResponse {
    pub document_id: Uuid,
    pub number: String,
    pub total_amount: f64,
    pub status: String,
    pub issue_date: DateTime<Utc>,
    pub remaining_credits: i64,
}

fn issue_response(document: Document, remaining: i64) -> Result<IssueDocumentResponse, AppError> {
    let snapshot = document.snapshot().map_err(anyhow::Error::new)?;
    Ok(IssueDocumentResponse {
        document_id: document.document_id,
        number: snapshot.number,
        total_amount: snapshot.total_amount,
        status: document.status,
        issue_date: snapshot.issue_date,
        remaining_credits: remaining,
    })
}

pub async fn issue_document(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(payload): Json<IssueDocumentRequest>,
) -> Result<(StatusCode, Json<IssueDocumentResponse>), AppError> {
    let account = current_account(&state, &identity).await?;
    state
        .db
        .authorize(account.account_id, payload.organization_id, None)
        .await?;

    let (document, remaining) = state
        .db
        .issue_document(payload.organization_id, account.account_id)
        .await?;
    Ok((StatusCode::CREATED, Json(issue_response(document, remaining)?)))
}

#[derive(Debug, Deserialize)]
pub struct IssueForClientRequest {
    pub organization_id: Uuid,
    pub client_profile_id: Uuid,
    pub tax_profile_id: Uuid,
    pub description: Option<String>,
    pub subtotal: Option<f64>,
}

pub async fn issue_document_for_client(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(payload): Json<IssueForClientRequest>,
) -> Result<(StatusCode, Json<IssueDocumentResponse>), AppError> {
    let account = current_account(&state, &identity).await?;
    state
        .db
        .authorize(account.account_id, payload.organization_id, Some(Role::Admin))
        .await?;

    let (document, remaining) = state
        .db
        .issue_document_for_client(
            payload.organization_id,
            payload.client_profile_id,
            payload.tax_profile_id,
            IssueOptions {
                description: payload.description,
                subtotal: payload.subtotal,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(issue_response(document, remaining)?)))
}

pub async fn list_documents(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(organization_id): Path<Uuid>,
) -> Result<Json<Vec<Document>>, AppError> {
    let account = current_account(&state, &identity).await?;
    state
        .db
        .authorize(account.account_id, organization_id, None)
        .await?;

    let documents = state.db.list_documents(organization_id).await?;
    Ok(Json(documents))
}
