//! Payment-provider webhook endpoint.
//!
//! Verifies the signed delivery, normalizes the wire payload into a
//! [`ProviderEvent`] (fetching the subscription object where the payload
//! is not self-contained) and hands it to the reconciler. Signature and
//! parse failures are the only 400s; everything the reconciler decides
//! is acknowledged with 200 so the provider stops retrying.

use axum::{extract::State, http::HeaderMap, Json};
use chrono::Utc;
use serde::Serialize;
use service_core::error::AppError;
use service_core::utils::signature::verify_signature_header;
use tracing::{info, warn};

use crate::models::{ProviderEvent, ReconcileOutcome};
use crate::services::metrics::PROVIDER_EVENTS_TOTAL;
use crate::services::stripe::{
    CheckoutSessionObject, Event, InvoiceObject, StripeClient, SubscriptionObject,
};
use crate::AppState;

const SIGNATURE_HEADER: &str = "stripe-signature";
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub received: bool,
    pub outcome: &'static str,
}

pub async fn provider_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, AppError> {
    let header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Missing signature header")))?;

    let secret = {
        use secrecy::ExposeSecret;
        state.config.provider.webhook_secret.expose_secret().clone()
    };

    let valid = verify_signature_header(
        &secret,
        header,
        &body,
        SIGNATURE_TOLERANCE_SECS,
        Utc::now().timestamp(),
    )
    .map_err(AppError::InternalError)?;

    if !valid {
        warn!("Webhook signature verification failed");
        return Err(AppError::BadRequest(anyhow::anyhow!("Invalid signature")));
    }

    let event = StripeClient::parse_event(&body)?;
    info!(event_id = %event.id, event_type = %event.event_type, "Provider event received");

    let normalized = normalize_event(&state, &event).await?;
    let outcome = state
        .db
        .apply_provider_event(&event.id, &normalized, &state.config.plan_catalog())
        .await?;

    PROVIDER_EVENTS_TOTAL
        .with_label_values(&[normalized.kind(), outcome.as_str()])
        .inc();

    if outcome == ReconcileOutcome::MissingOrganization {
        warn!(event_id = %event.id, "Acknowledged event for unknown organization");
    }

    Ok(Json(WebhookResponse {
        received: true,
        outcome: outcome.as_str(),
    }))
}

fn decode_object<T: serde::de::DeserializeOwned>(event: &Event) -> Result<T, AppError> {
    serde_json::from_value(event.data.object.clone())
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Malformed event object: {e}")))
}

/// Map a wire event onto the reconciler's vocabulary. Payloads that lack
/// the metadata we stamp at checkout degrade to `Unknown` rather than
/// erroring; they are not ours to process.
async fn normalize_event(state: &AppState, event: &Event) -> Result<ProviderEvent, AppError> {
    let unknown = || ProviderEvent::Unknown {
        event_type: event.event_type.clone(),
    };

    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let session: CheckoutSessionObject = decode_object(event)?;
            let (Some(organization_id), Some(subscription_id)) =
                (session.organization_id(), session.subscription.clone())
            else {
                warn!(event_id = %event.id, "Checkout session without organization metadata or subscription");
                return Ok(unknown());
            };

            let subscription = state.stripe.retrieve_subscription(&subscription_id).await?;
            Ok(ProviderEvent::CheckoutCompleted {
                organization_id,
                customer_id: session
                    .customer
                    .unwrap_or_else(|| subscription.customer.clone()),
                subscription_id,
                price_id: subscription.price_id().unwrap_or_default().to_string(),
                current_period_end: subscription.period_end_utc(),
            })
        }

        "customer.subscription.updated" => {
            let subscription: SubscriptionObject = decode_object(event)?;
            match subscription.organization_id() {
                Some(organization_id) => Ok(ProviderEvent::SubscriptionUpdated {
                    organization_id,
                    provider_status: subscription.status.clone(),
                    current_period_end: subscription.period_end_utc(),
                }),
                None => Ok(unknown()),
            }
        }

        "customer.subscription.deleted" => {
            let subscription: SubscriptionObject = decode_object(event)?;
            match subscription.organization_id() {
                Some(organization_id) => Ok(ProviderEvent::SubscriptionDeleted { organization_id }),
                None => Ok(unknown()),
            }
        }

        "invoice.payment_succeeded" => {
            let invoice: InvoiceObject = decode_object(event)?;
            let Some(subscription_id) = invoice.subscription.clone() else {
                return Ok(unknown());
            };

            let subscription = state.stripe.retrieve_subscription(&subscription_id).await?;
            match subscription.organization_id() {
                Some(organization_id) => Ok(ProviderEvent::PaymentSucceeded {
                    organization_id,
                    price_id: subscription.price_id().unwrap_or_default().to_string(),
                    cycle_renewal: invoice.is_cycle_renewal(),
                }),
                None => Ok(unknown()),
            }
        }

        "invoice.payment_failed" => {
            let invoice: InvoiceObject = decode_object(event)?;
            let Some(subscription_id) = invoice.subscription.clone() else {
                return Ok(unknown());
            };

            let subscription = state.stripe.retrieve_subscription(&subscription_id).await?;
            match subscription.organization_id() {
                Some(organization_id) => Ok(ProviderEvent::PaymentFailed { organization_id }),
                None => Ok(unknown()),
            }
        }

        _ => Ok(unknown()),
    }
}
