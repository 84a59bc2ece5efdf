//! Stripe payment provider client.
//!
//! Covers the surface this service needs: customers, subscription
//! checkout sessions, the billing portal, subscription retrieval and
//! typed webhook payload parsing. Stripe's API is form-encoded on the
//! way in and JSON on the way out.

use crate::config::ProviderConfig;
use chrono::{DateTime, Utc};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use service_core::error::AppError;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    config: ProviderConfig,
}

/// Stripe customer, reduced to what we read back.
#[derive(Debug, Deserialize)]
pub struct Customer {
    pub id: String,
}

/// Checkout session returned at creation time; `url` is where the buyer
/// gets redirected.
#[derive(Debug, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PortalSession {
    pub url: String,
}

/// Subscription object as Stripe returns it, reduced to the fields the
/// reconciler needs.
#[derive(Debug, Deserialize)]
pub struct SubscriptionObject {
    pub id: String,
    pub customer: String,
    pub status: String,
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub items: SubscriptionItems,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionItems {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionItem {
    pub price: Price,
}

#[derive(Debug, Deserialize)]
pub struct Price {
    pub id: String,
}

impl SubscriptionObject {
    pub fn price_id(&self) -> Option<&str> {
        self.items.data.first().map(|i| i.price.id.as_str())
    }

    pub fn organization_id(&self) -> Option<Uuid> {
        self.metadata
            .get("organization_id")
            .and_then(|v| Uuid::parse_str(v).ok())
    }

    pub fn period_end_utc(&self) -> Option<DateTime<Utc>> {
        self.current_period_end
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

/// Checkout session as delivered in `checkout.session.completed`.
#[derive(Debug, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    pub customer: Option<String>,
    pub subscription: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSessionObject {
    pub fn organization_id(&self) -> Option<Uuid> {
        self.metadata
            .get("organization_id")
            .and_then(|v| Uuid::parse_str(v).ok())
    }
}

/// Invoice as delivered in `invoice.payment_succeeded` / `payment_failed`.
#[derive(Debug, Deserialize)]
pub struct InvoiceObject {
    pub id: String,
    pub subscription: Option<String>,
    pub billing_reason: Option<String>,
}

impl InvoiceObject {
    /// True only for recurring renewals, not the invoice that settles
    /// the original checkout.
    pub fn is_cycle_renewal(&self) -> bool {
        self.billing_reason.as_deref() == Some("subscription_cycle")
    }
}

/// Webhook envelope. The payload object stays untyped here; callers
/// decode it per event type.
#[derive(Debug, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

impl StripeClient {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.config.api_key.expose_secret().is_empty()
    }

    pub async fn create_customer(
        &self,
        email: &str,
        name: &str,
        organization_id: Uuid,
    ) -> Result<Customer, AppError> {
        let params = [
            ("email", email.to_string()),
            ("name", name.to_string()),
            (
                "metadata[organization_id]",
                organization_id.to_string(),
            ),
        ];
        self.post_form("/customers", &params).await
    }

    pub async fn create_checkout_session(
        &self,
        customer_id: &str,
        price_id: &str,
        organization_id: Uuid,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, AppError> {
        let params = [
            ("customer", customer_id.to_string()),
            ("mode", "subscription".to_string()),
            ("line_items[0][price]", price_id.to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", success_url.to_string()),
            ("cancel_url", cancel_url.to_string()),
            (
                "metadata[organization_id]",
                organization_id.to_string(),
            ),
            (
                "subscription_data[metadata][organization_id]",
                organization_id.to_string(),
            ),
        ];
        self.post_form("/checkout/sessions", &params).await
    }

    pub async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, AppError> {
        let params = [
            ("customer", customer_id.to_string()),
            ("return_url", return_url.to_string()),
        ];
        self.post_form("/billing_portal/sessions", &params).await
    }

    pub async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionObject, AppError> {
        let url = format!("{}/subscriptions/{}", self.config.api_base, subscription_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| AppError::BadGateway(e.to_string()))?;

        Self::decode(response).await
    }

    pub fn parse_event(body: &str) -> Result<Event, AppError> {
        serde_json::from_str(body)
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Malformed event payload: {e}")))
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, AppError> {
        if !self.is_configured() {
            return Err(AppError::BadGateway(
                "Payment provider credentials not configured".to_string(),
            ));
        }

        let url = format!("{}{}", self.config.api_base, path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .form(params)
            .send()
            .await
            .map_err(|e| AppError::BadGateway(e.to_string()))?;

        Self::decode(response).await
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::BadGateway(e.to_string()))?;

        tracing::debug!(status = %status, "Stripe API response");

        if status.is_success() {
            serde_json::from_str(&body).map_err(|e| {
                AppError::BadGateway(format!("Unexpected provider response shape: {e}"))
            })
        } else {
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| {
                    v.get("error")
                        .and_then(|e| e.get("message"))
                        .and_then(|m| m.as_str())
                        .map(String::from)
                })
                .unwrap_or(body);
            tracing::error!(status = %status, message = %message, "Stripe API call failed");
            Err(AppError::BadGateway(message))
        }
    }
}
