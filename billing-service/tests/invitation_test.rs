mod common;

use common::TestApp;
use service_core::error::AppError;
use uuid::Uuid;

async fn admin_org(app: &TestApp, tag: &str) -> (Uuid, Uuid, String) {
    let external_id = format!("user_inv_{tag}");
    let email = format!("inv_{tag}@example.mx");
    let account_id = app.sync_account(&external_id, &email).await;
    let token = app.token_for(&external_id, &email, None);
    let org_id = app
        .create_organization(&token, &format!("Inv {tag}"), &TestApp::unique_tax_id())
        .await;
    (org_id, account_id, token)
}

#[tokio::test]
async fn issue_validate_accept_flow() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let (org_id, _, admin_token) = admin_org(&app, "flow").await;

    let response = app
        .client
        .post(format!("{}/invitations", app.address))
        .bearer_auth(&admin_token)
        .json(&serde_json::json!({
            "organization_id": org_id,
            "email": "invitee_flow@example.mx"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    let body: serde_json::Value = response.json().await.unwrap();
    let link = body["invite_link"].as_str().unwrap();
    let token = link.split("token=").nth(1).unwrap().to_string();
    assert_eq!(token.len(), 64);

    // Public validation shows display data but never the token.
    let response = app
        .client
        .post(format!("{}/invitations/validate", app.address))
        .json(&serde_json::json!({ "token": token }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let preview: serde_json::Value = response.json().await.unwrap();
    assert_eq!(preview["invitee_email"], "invitee_flow@example.mx");
    assert_eq!(preview["organization_name"], "Inv flow");
    assert!(preview.get("token").is_none());

    // The invitee signs in and accepts.
    let invitee_token = app.token_for("user_invitee_flow", "invitee_flow@example.mx", None);
    let response = app
        .client
        .post(format!("{}/invitations/accept", app.address))
        .bearer_auth(&invitee_token)
        .json(&serde_json::json!({ "token": token }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let membership: serde_json::Value = response.json().await.unwrap();
    assert_eq!(membership["role"], "member");

    // Consumed: validation now reports invalid.
    let response = app
        .client
        .post(format!("{}/invitations/validate", app.address))
        .json(&serde_json::json!({ "token": token }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn invitation_for_existing_member_conflicts() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let (org_id, admin_id, _) = admin_org(&app, "member").await;

    let err = app
        .db
        .issue_invitation(org_id, admin_id, "inv_member@example.mx", 7)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn duplicate_pending_invitation_conflicts() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let (org_id, admin_id, _) = admin_org(&app, "pending").await;

    app.db
        .issue_invitation(org_id, admin_id, "twice@example.mx", 7)
        .await
        .unwrap();
    let err = app
        .db
        .issue_invitation(org_id, admin_id, "TWICE@example.mx", 7)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn expired_invitation_is_invalid_for_validate_and_accept() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let (org_id, admin_id, _) = admin_org(&app, "expired").await;

    let invitation = app
        .db
        .issue_invitation(org_id, admin_id, "late@example.mx", -1)
        .await
        .unwrap();

    let err = app.db.validate_invitation(&invitation.token).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    app.sync_account("user_late", "late@example.mx").await;
    let account = app
        .db
        .find_account_by_external_id("user_late")
        .await
        .unwrap()
        .unwrap();
    let err = app
        .db
        .accept_invitation(&invitation.token, &account)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn acceptance_requires_matching_email() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let (org_id, admin_id, _) = admin_org(&app, "mismatch").await;

    let invitation = app
        .db
        .issue_invitation(org_id, admin_id, "right@example.mx", 7)
        .await
        .unwrap();

    app.sync_account("user_wrong", "wrong@example.mx").await;
    let imposter = app
        .db
        .find_account_by_external_id("user_wrong")
        .await
        .unwrap()
        .unwrap();

    let err = app
        .db
        .accept_invitation(&invitation.token, &imposter)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn concurrent_accepts_consume_token_once() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let (org_id, admin_id, _) = admin_org(&app, "race").await;

    let invitation = app
        .db
        .issue_invitation(org_id, admin_id, "racer@example.mx", 7)
        .await
        .unwrap();

    app.sync_account("user_racer", "racer@example.mx").await;
    let account = app
        .db
        .find_account_by_external_id("user_racer")
        .await
        .unwrap()
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..2 {
        let db = app.db.clone();
        let token = invitation.token.clone();
        let account = account.clone();
        handles.push(tokio::spawn(async move {
            db.accept_invitation(&token, &account).await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            succeeded += 1;
        }
    }
    assert_eq!(succeeded, 1);

    let members = app.db.list_members(org_id).await.unwrap();
    assert_eq!(members.len(), 2);
}

#[tokio::test]
async fn non_admin_cannot_issue_invitations() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let (org_id, admin_id, _) = admin_org(&app, "gate").await;

    let invitation = app
        .db
        .issue_invitation(org_id, admin_id, "plain@example.mx", 7)
        .await
        .unwrap();

    let member_token = app.token_for("user_plain", "plain@example.mx", None);
    app.sync_account("user_plain", "plain@example.mx").await;
    let member = app
        .db
        .find_account_by_external_id("user_plain")
        .await
        .unwrap()
        .unwrap();
    app.db
        .accept_invitation(&invitation.token, &member)
        .await
        .unwrap();

    let response = app
        .client
        .post(format!("{}/invitations", app.address))
        .bearer_auth(&member_token)
        .json(&serde_json::json!({
            "organization_id": org_id,
            "email": "someone@example.mx"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
}
