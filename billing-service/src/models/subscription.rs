//! Subscription model, 1:1 with an organization. Written only by the
//! billing reconciler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Local subscription status. Provider statuses are copied verbatim when
/// they match; anything unrecognized becomes `Unknown` rather than an
/// error, so a provider-side vocabulary change cannot break event
/// processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    PastDue,
    Canceled,
    Incomplete,
    Unknown,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::Unknown => "unknown",
        }
    }

    pub fn from_provider(s: &str) -> Self {
        match s {
            "active" => SubscriptionStatus::Active,
            "past_due" => SubscriptionStatus::PastDue,
            "canceled" => SubscriptionStatus::Canceled,
            "incomplete" | "incomplete_expired" => SubscriptionStatus::Incomplete,
            _ => SubscriptionStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Subscription {
    pub organization_id: Uuid,
    pub provider_customer_id: String,
    pub provider_subscription_id: String,
    pub status: String,
    pub plan_type: String,
    pub current_period_end: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Subscription {
    pub fn status(&self) -> SubscriptionStatus {
        SubscriptionStatus::from_provider(&self.status)
    }

    pub fn is_active(&self) -> bool {
        self.status() == SubscriptionStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_statuses_map_verbatim() {
        assert_eq!(
            SubscriptionStatus::from_provider("active"),
            SubscriptionStatus::Active
        );
        assert_eq!(
            SubscriptionStatus::from_provider("past_due"),
            SubscriptionStatus::PastDue
        );
        assert_eq!(
            SubscriptionStatus::from_provider("canceled"),
            SubscriptionStatus::Canceled
        );
    }

    #[test]
    fn unrecognized_provider_status_is_unknown_not_error() {
        assert_eq!(
            SubscriptionStatus::from_provider("trialing"),
            SubscriptionStatus::Unknown
        );
        assert_eq!(
            SubscriptionStatus::from_provider(""),
            SubscriptionStatus::Unknown
        );
    }
}
