//! Billing-event reconciliation.
//!
//! Applies a normalized provider event to local subscription and ledger
//! state. Dedup, subscription writes and credit grants happen in one
//! transaction keyed on the provider event id, so a redelivered event
//! either replays nothing or everything.

use crate::models::{PlanCatalog, ProviderEvent, ReconcileOutcome};
use crate::services::{ledger, metrics, Database};
use service_core::error::AppError;
use sqlx::PgConnection;
use tracing::{info, instrument, warn};
use uuid::Uuid;

impl Database {
    /// Apply one provider event. Never returns an error for events we
    /// choose not to act on; every [`ReconcileOutcome`] is an
    /// acknowledgement.
    #[instrument(skip(self, event, catalog), fields(event_id = event_id, kind = event.kind()))]
    pub async fn apply_provider_event(
        &self,
        event_id: &str,
        event: &ProviderEvent,
        catalog: &PlanCatalog,
    ) -> Result<ReconcileOutcome, AppError> {
        let event_type = match event {
            ProviderEvent::Unknown { event_type } => {
                info!(event_type = %event_type, "Ignoring unhandled provider event");
                return Ok(ReconcileOutcome::SkippedUnknown);
            }
            other => other.kind(),
        };

        let mut tx = self.pool().begin().await?;

        let claimed = sqlx::query(
            r#"
            INSERT INTO processed_events (event_id, event_type, processed_utc)
            VALUES ($1, $2, NOW())
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(event_type)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            info!("Duplicate provider event, already processed");
            return Ok(ReconcileOutcome::Duplicate);
        }

        let organization_id = match event {
            ProviderEvent::CheckoutCompleted { organization_id, .. }
            | ProviderEvent::SubscriptionUpdated { organization_id, .. }
            | ProviderEvent::SubscriptionDeleted { organization_id }
            | ProviderEvent::PaymentSucceeded { organization_id, .. }
            | ProviderEvent::PaymentFailed { organization_id } => *organization_id,
            ProviderEvent::Unknown { .. } => unreachable!(),
        };

        let org_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM organizations WHERE organization_id = $1)",
        )
        .bind(organization_id)
        .fetch_one(&mut *tx)
        .await?;

        if !org_exists {
            // Roll back so the dedup row is not consumed; a provider
            // retry can apply once the organization record exists.
            warn!(organization_id = %organization_id, "Provider event references unknown organization");
            tx.rollback().await?;
            return Ok(ReconcileOutcome::MissingOrganization);
        }

        match event {
            ProviderEvent::CheckoutCompleted {
                organization_id,
                customer_id,
                subscription_id,
                price_id,
                current_period_end,
            } => {
                sqlx::query(
                    r#"
                    INSERT INTO subscriptions
                        (organization_id, provider_customer_id, provider_subscription_id,
                         status, plan_type, current_period_end, created_utc, updated_utc)
                    VALUES ($1, $2, $3, 'active', $4, $5, NOW(), NOW())
                    ON CONFLICT (organization_id) DO UPDATE SET
                        provider_customer_id = EXCLUDED.provider_customer_id,
                        provider_subscription_id = EXCLUDED.provider_subscription_id,
                        status = EXCLUDED.status,
                        plan_type = EXCLUDED.plan_type,
                        current_period_end = EXCLUDED.current_period_end,
                        updated_utc = NOW()
                    "#,
                )
                .bind(organization_id)
                .bind(customer_id)
                .bind(subscription_id)
                .bind(catalog.plan_type_for(price_id))
                .bind(current_period_end)
                .execute(&mut *tx)
                .await?;

                grant_plan_credits(&mut tx, *organization_id, price_id, catalog).await?;
            }

            ProviderEvent::SubscriptionUpdated {
                organization_id,
                provider_status,
                current_period_end,
            } => {
                // Provider status strings are stored verbatim; the enum
                // mapping happens on read.
                let updated = sqlx::query(
                    r#"
                    UPDATE subscriptions
                    SET status = $2, current_period_end = $3, updated_utc = NOW()
                    WHERE organization_id = $1
                    "#,
                )
                .bind(organization_id)
                .bind(provider_status)
                .bind(current_period_end)
                .execute(&mut *tx)
                .await?;

                if updated.rows_affected() == 0 {
                    warn!(organization_id = %organization_id, "Subscription update arrived before checkout, no-op");
                }
            }

            ProviderEvent::SubscriptionDeleted { organization_id } => {
                sqlx::query(
                    r#"
                    UPDATE subscriptions
                    SET status = 'canceled', updated_utc = NOW()
                    WHERE organization_id = $1
                    "#,
                )
                .bind(organization_id)
                .execute(&mut *tx)
                .await?;
            }

            ProviderEvent::PaymentSucceeded {
                organization_id,
                price_id,
                cycle_renewal,
            } => {
                // The payment that accompanies the original checkout is
                // already credited by CheckoutCompleted; only recurring
                // cycle renewals grant here.
                if *cycle_renewal {
                    grant_plan_credits(&mut tx, *organization_id, price_id, catalog).await?;
                } else {
                    info!(organization_id = %organization_id, "Non-renewal payment, no credit grant");
                }
            }

            ProviderEvent::PaymentFailed { organization_id } => {
                sqlx::query(
                    r#"
                    UPDATE subscriptions
                    SET status = 'past_due', updated_utc = NOW()
                    WHERE organization_id = $1
                    "#,
                )
                .bind(organization_id)
                .execute(&mut *tx)
                .await?;
            }

            ProviderEvent::Unknown { .. } => unreachable!(),
        }

        tx.commit().await?;
        info!(organization_id = %organization_id, "Provider event applied");
        Ok(ReconcileOutcome::Applied)
    }
}

async fn grant_plan_credits(
    conn: &mut PgConnection,
    organization_id: Uuid,
    price_id: &str,
    catalog: &PlanCatalog,
) -> Result<(), AppError> {
    let credits = catalog.credits_for(price_id);
    if credits == 0 {
        warn!(price_id = %price_id, "Price id not in plan catalog, no credit grant");
        return Ok(());
    }

    let balance = ledger::credit(conn, organization_id, credits).await?;
    metrics::CREDITS_GRANTED_TOTAL.inc_by(credits as u64);
    info!(credits = credits, new_balance = balance, "Plan credits granted");
    Ok(())
}
