//! Membership invitations: single-use, time-boxed tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
        }
    }
}

/// Expiry is time-based: a pending invitation past `expires_utc` is
/// unusable without any status transition or background job.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Invitation {
    pub invitation_id: Uuid,
    pub organization_id: Uuid,
    pub invited_by: Uuid,
    pub invitee_email: String,
    #[serde(skip_serializing)]
    pub token: String,
    pub status: String,
    pub expires_utc: DateTime<Utc>,
    pub created_utc: DateTime<Utc>,
}

impl Invitation {
    pub fn is_pending(&self) -> bool {
        self.status == InvitationStatus::Pending.as_str()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_utc < now
    }
}
