//! Account model: the internal record behind an identity-provider user.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// One row per identity-provider user. `external_id` is the stable
/// reference issued by the identity provider; it never changes and
/// accounts are never deleted.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Account {
    pub account_id: Uuid,
    pub external_id: String,
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}
