//! Normalized payment-provider events and reconciliation outcomes.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A provider event after signature verification, parsing and (where the
/// wire payload is not self-contained) remote subscription lookup. Every
/// variant the reconciler acts on carries the organization id resolved
/// from provider metadata; deliveries we do not recognize map to
/// `Unknown`, which logs and no-ops instead of failing.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    CheckoutCompleted {
        organization_id: Uuid,
        customer_id: String,
        subscription_id: String,
        price_id: String,
        current_period_end: Option<DateTime<Utc>>,
    },
    SubscriptionUpdated {
        organization_id: Uuid,
        provider_status: String,
        current_period_end: Option<DateTime<Utc>>,
    },
    SubscriptionDeleted {
        organization_id: Uuid,
    },
    PaymentSucceeded {
        organization_id: Uuid,
        price_id: String,
        /// True only for recurring cycle renewals, never for the payment
        /// that accompanied the original checkout.
        cycle_renewal: bool,
    },
    PaymentFailed {
        organization_id: Uuid,
    },
    Unknown {
        event_type: String,
    },
}

impl ProviderEvent {
    pub fn kind(&self) -> &str {
        match self {
            ProviderEvent::CheckoutCompleted { .. } => "checkout.completed",
            ProviderEvent::SubscriptionUpdated { .. } => "subscription.updated",
            ProviderEvent::SubscriptionDeleted { .. } => "subscription.deleted",
            ProviderEvent::PaymentSucceeded { .. } => "payment.succeeded",
            ProviderEvent::PaymentFailed { .. } => "payment.failed",
            ProviderEvent::Unknown { .. } => "unknown",
        }
    }
}

/// What the reconciler did with a delivery. All outcomes acknowledge the
/// delivery; none of them is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// State transitions and credit grants committed.
    Applied,
    /// Event id already processed; nothing changed.
    Duplicate,
    /// Event type we do not handle.
    SkippedUnknown,
    /// The referenced organization has no local record yet. The event is
    /// left unconsumed so a provider retry can land after the local
    /// record appears.
    MissingOrganization,
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Applied => "applied",
            ReconcileOutcome::Duplicate => "duplicate",
            ReconcileOutcome::SkippedUnknown => "skipped_unknown",
            ReconcileOutcome::MissingOrganization => "missing_organization",
        }
    }
}
