mod common;

use billing_service::models::{Plan, PlanCatalog, ProviderEvent, ReconcileOutcome};
use common::TestApp;
use uuid::Uuid;

fn catalog() -> PlanCatalog {
    PlanCatalog::new(vec![
        Plan {
            price_id: "price_basic_test".into(),
            plan_type: "Básico".into(),
            credits: 100,
        },
        Plan {
            price_id: "price_pro_test".into(),
            plan_type: "Profesional".into(),
            credits: 300,
        },
    ])
}

fn checkout_event(org_id: Uuid) -> ProviderEvent {
    ProviderEvent::CheckoutCompleted {
        organization_id: org_id,
        customer_id: "cus_test".into(),
        subscription_id: "sub_test".into(),
        price_id: "price_basic_test".into(),
        current_period_end: None,
    }
}

async fn setup_org(app: &TestApp, tag: &str) -> Uuid {
    let external_id = format!("user_recon_{tag}");
    let email = format!("recon_{tag}@example.mx");
    app.sync_account(&external_id, &email).await;
    let token = app.token_for(&external_id, &email, None);
    app.create_organization(&token, &format!("Recon {tag}"), &TestApp::unique_tax_id())
        .await
}

#[tokio::test]
async fn checkout_creates_subscription_and_grants_credits() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let org_id = setup_org(&app, "checkout").await;

    let outcome = app
        .db
        .apply_provider_event("evt_checkout_1", &checkout_event(org_id), &catalog())
        .await
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::Applied);

    let subscription = app.db.get_subscription(org_id).await.unwrap().unwrap();
    assert_eq!(subscription.status, "active");
    assert_eq!(subscription.plan_type, "Básico");
    assert_eq!(subscription.provider_customer_id, "cus_test");

    assert_eq!(app.db.get_balance(org_id).await.unwrap(), 100);
}

#[tokio::test]
async fn duplicate_event_id_applies_once() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let org_id = setup_org(&app, "dup").await;
    let event = checkout_event(org_id);

    let first = app
        .db
        .apply_provider_event("evt_dup", &event, &catalog())
        .await
        .unwrap();
    let second = app
        .db
        .apply_provider_event("evt_dup", &event, &catalog())
        .await
        .unwrap();

    assert_eq!(first, ReconcileOutcome::Applied);
    assert_eq!(second, ReconcileOutcome::Duplicate);
    assert_eq!(app.db.get_balance(org_id).await.unwrap(), 100);
}

#[tokio::test]
async fn unknown_event_type_is_skipped() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };

    let outcome = app
        .db
        .apply_provider_event(
            "evt_unknown",
            &ProviderEvent::Unknown {
                event_type: "customer.created".into(),
            },
            &catalog(),
        )
        .await
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::SkippedUnknown);
}

#[tokio::test]
async fn missing_organization_leaves_event_unconsumed() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };

    let phantom = Uuid::new_v4();
    let outcome = app
        .db
        .apply_provider_event("evt_orphan", &checkout_event(phantom), &catalog())
        .await
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::MissingOrganization);

    // Once the organization exists, a provider retry with the same event
    // id must land.
    let org_id = setup_org(&app, "orphan").await;
    let outcome = app
        .db
        .apply_provider_event("evt_orphan", &checkout_event(org_id), &catalog())
        .await
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::Applied);
    assert_eq!(app.db.get_balance(org_id).await.unwrap(), 100);
}

#[tokio::test]
async fn subscription_update_copies_provider_status_verbatim() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let org_id = setup_org(&app, "status").await;

    app.db
        .apply_provider_event("evt_status_1", &checkout_event(org_id), &catalog())
        .await
        .unwrap();

    let outcome = app
        .db
        .apply_provider_event(
            "evt_status_2",
            &ProviderEvent::SubscriptionUpdated {
                organization_id: org_id,
                provider_status: "trialing".into(),
                current_period_end: None,
            },
            &catalog(),
        )
        .await
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::Applied);

    let subscription = app.db.get_subscription(org_id).await.unwrap().unwrap();
    assert_eq!(subscription.status, "trialing");
    assert_eq!(
        subscription.status(),
        billing_service::models::SubscriptionStatus::Unknown
    );
}

#[tokio::test]
async fn subscription_deleted_cancels() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let org_id = setup_org(&app, "deleted").await;

    app.db
        .apply_provider_event("evt_del_1", &checkout_event(org_id), &catalog())
        .await
        .unwrap();
    app.db
        .apply_provider_event(
            "evt_del_2",
            &ProviderEvent::SubscriptionDeleted {
                organization_id: org_id,
            },
            &catalog(),
        )
        .await
        .unwrap();

    let subscription = app.db.get_subscription(org_id).await.unwrap().unwrap();
    assert_eq!(subscription.status, "canceled");
}

#[tokio::test]
async fn cycle_renewal_grants_credits_but_initial_payment_does_not() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let org_id = setup_org(&app, "renewal").await;

    app.db
        .apply_provider_event("evt_renew_1", &checkout_event(org_id), &catalog())
        .await
        .unwrap();
    assert_eq!(app.db.get_balance(org_id).await.unwrap(), 100);

    // The payment accompanying checkout must not double-grant.
    app.db
        .apply_provider_event(
            "evt_renew_2",
            &ProviderEvent::PaymentSucceeded {
                organization_id: org_id,
                price_id: "price_basic_test".into(),
                cycle_renewal: false,
            },
            &catalog(),
        )
        .await
        .unwrap();
    assert_eq!(app.db.get_balance(org_id).await.unwrap(), 100);

    app.db
        .apply_provider_event(
            "evt_renew_3",
            &ProviderEvent::PaymentSucceeded {
                organization_id: org_id,
                price_id: "price_basic_test".into(),
                cycle_renewal: true,
            },
            &catalog(),
        )
        .await
        .unwrap();
    assert_eq!(app.db.get_balance(org_id).await.unwrap(), 200);
}

#[tokio::test]
async fn payment_failure_marks_past_due() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let org_id = setup_org(&app, "pastdue").await;

    app.db
        .apply_provider_event("evt_fail_1", &checkout_event(org_id), &catalog())
        .await
        .unwrap();
    app.db
        .apply_provider_event(
            "evt_fail_2",
            &ProviderEvent::PaymentFailed {
                organization_id: org_id,
            },
            &catalog(),
        )
        .await
        .unwrap();

    let subscription = app.db.get_subscription(org_id).await.unwrap().unwrap();
    assert_eq!(subscription.status, "past_due");
}

#[tokio::test]
async fn unknown_price_id_records_subscription_without_grant() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let org_id = setup_org(&app, "noprice").await;

    let outcome = app
        .db
        .apply_provider_event(
            "evt_noprice",
            &ProviderEvent::CheckoutCompleted {
                organization_id: org_id,
                customer_id: "cus_x".into(),
                subscription_id: "sub_x".into(),
                price_id: "price_not_in_catalog".into(),
                current_period_end: None,
            },
            &catalog(),
        )
        .await
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::Applied);

    let subscription = app.db.get_subscription(org_id).await.unwrap().unwrap();
    assert_eq!(subscription.plan_type, "Unknown");
    assert_eq!(app.db.get_balance(org_id).await.unwrap(), 0);
}
