//! Billing-specific Prometheus metrics. HTTP-level metrics live in
//! service-core middleware; these count domain events.

use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};

pub static DOCUMENTS_ISSUED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "billing_documents_issued_total",
        "Total documents issued across all organizations"
    )
    .unwrap()
});

pub static CREDITS_GRANTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "billing_credits_granted_total",
        "Total credits granted by the reconciler"
    )
    .unwrap()
});

pub static PROVIDER_EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "billing_provider_events_total",
        "Provider webhook deliveries by event kind and reconcile outcome",
        &["kind", "outcome"]
    )
    .unwrap()
});

pub static INVITATIONS_ACCEPTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "billing_invitations_accepted_total",
        "Total invitations accepted"
    )
    .unwrap()
});
