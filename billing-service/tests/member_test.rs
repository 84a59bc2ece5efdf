mod common;

use common::TestApp;
use uuid::Uuid;

struct Org {
    org_id: Uuid,
    admin_id: Uuid,
    admin_token: String,
    member_id: Uuid,
    member_token: String,
}

/// Organization with one admin and one accepted member.
async fn org_with_member(app: &TestApp, tag: &str) -> Org {
    let admin_ext = format!("user_mem_admin_{tag}");
    let admin_email = format!("mem_admin_{tag}@example.mx");
    let admin_id = app.sync_account(&admin_ext, &admin_email).await;
    let admin_token = app.token_for(&admin_ext, &admin_email, None);
    let org_id = app
        .create_organization(&admin_token, &format!("Mem {tag}"), &TestApp::unique_tax_id())
        .await;

    let member_email = format!("mem_member_{tag}@example.mx");
    let invitation = app
        .db
        .issue_invitation(org_id, admin_id, &member_email, 7)
        .await
        .unwrap();

    let member_ext = format!("user_mem_member_{tag}");
    let member_id = app.sync_account(&member_ext, &member_email).await;
    let member = app.db.get_account(member_id).await.unwrap().unwrap();
    app.db
        .accept_invitation(&invitation.token, &member)
        .await
        .unwrap();

    Org {
        org_id,
        admin_id,
        admin_token,
        member_id,
        member_token: app.token_for(&member_ext, &member_email, None),
    }
}

#[tokio::test]
async fn member_listing_is_admin_gated() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let org = org_with_member(&app, "list").await;

    let response = app
        .client
        .get(format!("{}/organizations/{}/members", app.address, org.org_id))
        .bearer_auth(&org.admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let members: serde_json::Value = response.json().await.unwrap();
    assert_eq!(members.as_array().unwrap().len(), 2);

    let response = app
        .client
        .get(format!("{}/organizations/{}/members", app.address, org.org_id))
        .bearer_auth(&org.member_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn admin_can_remove_a_member() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let org = org_with_member(&app, "remove").await;

    let response = app
        .client
        .delete(format!(
            "{}/organizations/{}/members/{}",
            app.address, org.org_id, org.member_id
        ))
        .bearer_auth(&org.admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    let members = app.db.list_members(org.org_id).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].account_id, org.admin_id);
}

#[tokio::test]
async fn last_admin_cannot_be_removed() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let org = org_with_member(&app, "guard").await;

    let response = app
        .client
        .delete(format!(
            "{}/organizations/{}/members/{}",
            app.address, org.org_id, org.admin_id
        ))
        .bearer_auth(&org.admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);

    // Both rows intact.
    assert_eq!(app.db.list_members(org.org_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn removing_unknown_member_is_not_found() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let org = org_with_member(&app, "missing").await;

    let response = app
        .client
        .delete(format!(
            "{}/organizations/{}/members/{}",
            app.address,
            org.org_id,
            Uuid::new_v4()
        ))
        .bearer_auth(&org.admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}
