//! End-to-end checks of the HTTP surface.

mod common;

use common::{TestApp, TEST_PASSWORD};
use parm::crud::{roles, users};
use serde_json::{json, Value};

#[tokio::test]
async fn login_issues_a_bearer_token() {
    // Arrange
    let app = TestApp::spawn().await;
    let user = app.user(None).await;

    // Act
    let response = app
        .post_public(
            "/auth/login",
            &json!({ "email": user.email, "password": TEST_PASSWORD }),
        )
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["user"]["id"], user.id);
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let app = TestApp::spawn().await;
    let user = app.user(None).await;

    let response = app
        .post_public(
            "/auth/login",
            &json!({ "email": user.email, "password": "not the password" }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn current_user_lists_roles() {
    let app = TestApp::spawn().await;
    let manager = app.user(Some(roles::MANAGER)).await;

    let response = app.get("/auth/me", &manager.access_token).await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user"]["email"], manager.email.as_str());
    assert_eq!(body["roles"], json!([roles::MANAGER]));
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    // Arrange
    let app = TestApp::spawn().await;

    // Act
    let missing = app.get_public("/assets").await;
    let garbage = app.get("/assets", "not-a-jwt").await;

    // Assert
    assert_eq!(missing.status().as_u16(), 401);
    assert_eq!(garbage.status().as_u16(), 401);
}

#[tokio::test]
async fn creating_assets_needs_the_create_permission() {
    // Arrange
    let app = TestApp::spawn().await;
    let viewer = app.user(Some(roles::VIEWER)).await;
    let manager = app.user(Some(roles::MANAGER)).await;
    let body = json!({ "name": "Fog machine", "currency": "USD", "purchase_price_cents": 45000 });

    // Act
    let denied = app.post("/assets", &viewer.access_token, &body).await;
    let created = app.post("/assets", &manager.access_token, &body).await;

    // Assert
    assert_eq!(denied.status().as_u16(), 403);
    let denied: Value = denied.json().await.unwrap();
    assert_eq!(denied["code"], "PERMISSION_DENIED");

    assert_eq!(created.status().as_u16(), 201);
    let created: Value = created.json().await.unwrap();
    assert_eq!(created["asset"]["name"], "Fog machine");
    assert_eq!(created["archived"], false);
    assert_eq!(created["latest_audit"]["operation"], "create");
    assert_eq!(created["latest_audit"]["created_by"], manager.id);
}

#[tokio::test]
async fn archived_assets_leave_the_default_list() {
    // Arrange
    let app = TestApp::spawn().await;
    let manager = app.user(Some(roles::MANAGER)).await;
    let viewer = app.user(Some(roles::VIEWER)).await;
    let kept = app.create_asset(&manager.access_token, "Apple box").await;
    let shelved = app.create_asset(&manager.access_token, "Old dolly").await;

    // Act
    let archived = app
        .post(
            &format!("/assets/{}/archive", shelved),
            &manager.access_token,
            &json!({ "details": "wheels worn out" }),
        )
        .await;
    let active: Value = app
        .get("/assets", &viewer.access_token)
        .await
        .json()
        .await
        .unwrap();
    let viewer_archived = app
        .get("/assets?just_archived=true", &viewer.access_token)
        .await;
    let manager_archived = app
        .get("/assets?just_archived=true", &manager.access_token)
        .await;

    // Assert
    assert_eq!(archived.status().as_u16(), 200);
    let entry: Value = archived.json().await.unwrap();
    assert_eq!(entry["archived"], true);
    assert_eq!(entry["details"], "wheels worn out");

    let ids: Vec<i64> = active["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["asset"]["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![kept as i64]);
    assert_eq!(active["pagination"]["total_count"], 1);

    assert_eq!(viewer_archived.status().as_u16(), 403);
    assert_eq!(manager_archived.status().as_u16(), 200);
    let only_archived: Value = manager_archived.json().await.unwrap();
    assert_eq!(only_archived["data"][0]["asset"]["id"], shelved);
    assert_eq!(only_archived["data"][0]["archived"], true);
}

#[tokio::test]
async fn conflicting_archival_flags_are_rejected() {
    let app = TestApp::spawn().await;
    let manager = app.user(Some(roles::MANAGER)).await;

    let response = app
        .get(
            "/assets?include_archived=true&just_archived=true",
            &manager.access_token,
        )
        .await;

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn archived_asset_is_hidden_from_direct_reads() {
    // Arrange
    let app = TestApp::spawn().await;
    let manager = app.user(Some(roles::MANAGER)).await;
    let asset_id = app.create_asset(&manager.access_token, "Flag kit").await;
    app.post(
        &format!("/assets/{}/archive", asset_id),
        &manager.access_token,
        &json!({}),
    )
    .await;

    // Act
    let hidden = app
        .get(&format!("/assets/{}", asset_id), &manager.access_token)
        .await;
    let included = app
        .get(
            &format!("/assets/{}?include_archived=true", asset_id),
            &manager.access_token,
        )
        .await;

    // Assert
    assert_eq!(hidden.status().as_u16(), 404);
    let hidden: Value = hidden.json().await.unwrap();
    assert_eq!(hidden["code"], "ASSET_NOT_FOUND");
    assert_eq!(included.status().as_u16(), 200);
}

#[tokio::test]
async fn archive_and_restore_are_not_repeatable() {
    // Arrange
    let app = TestApp::spawn().await;
    let manager = app.user(Some(roles::MANAGER)).await;
    let asset_id = app.create_asset(&manager.access_token, "C-stand").await;
    let archive = format!("/assets/{}/archive", asset_id);
    let restore = format!("/assets/{}/restore", asset_id);

    // Act
    let early_restore = app.post(&restore, &manager.access_token, &json!({})).await;
    let first = app.post(&archive, &manager.access_token, &json!({})).await;
    let second = app.post(&archive, &manager.access_token, &json!({})).await;
    let restored = app.post(&restore, &manager.access_token, &json!({})).await;
    let history: Value = app
        .get(&format!("/assets/{}/history", asset_id), &manager.access_token)
        .await
        .json()
        .await
        .unwrap();

    // Assert
    assert_eq!(early_restore.status().as_u16(), 409);
    assert_eq!(first.status().as_u16(), 200);
    assert_eq!(second.status().as_u16(), 409);
    assert_eq!(restored.status().as_u16(), 200);

    let entries = history.as_array().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["archived"], false);
    assert_eq!(entries[1]["archived"], true);
    assert_eq!(entries[2]["operation"], "create");
}

#[tokio::test]
async fn viewer_cannot_read_history_of_archived_asset() {
    let app = TestApp::spawn().await;
    let manager = app.user(Some(roles::MANAGER)).await;
    let viewer = app.user(Some(roles::VIEWER)).await;
    let asset_id = app.create_asset(&manager.access_token, "Sound cart").await;
    let history = format!("/assets/{}/history", asset_id);

    let before = app.get(&history, &viewer.access_token).await;
    app.post(
        &format!("/assets/{}/archive", asset_id),
        &manager.access_token,
        &json!({}),
    )
    .await;
    let after = app.get(&history, &viewer.access_token).await;
    let unknown = app.get("/assets/424242/history", &viewer.access_token).await;

    assert_eq!(before.status().as_u16(), 200);
    assert_eq!(after.status().as_u16(), 403);
    assert_eq!(unknown.status().as_u16(), 404);
}

#[tokio::test]
async fn updating_and_deleting_an_asset() {
    // Arrange
    let app = TestApp::spawn().await;
    let manager = app.user(Some(roles::MANAGER)).await;
    let admin = app.user(Some(roles::ADMIN)).await;
    let asset_id = app.create_asset(&manager.access_token, "Slate").await;
    let path = format!("/assets/{}", asset_id);

    // Act
    let updated = app
        .put(&path, &manager.access_token, &json!({ "serial_number": "SL-001" }))
        .await;
    let empty = app.put(&path, &manager.access_token, &json!({})).await;
    let manager_delete = app.delete(&path, &manager.access_token).await;
    let admin_delete = app.delete(&path, &admin.access_token).await;
    let gone = app.get(&path, &admin.access_token).await;

    // Assert
    assert_eq!(updated.status().as_u16(), 200);
    let updated: Value = updated.json().await.unwrap();
    assert_eq!(updated["asset"]["serial_number"], "SL-001");
    assert_eq!(updated["latest_audit"]["operation"], "update");
    assert_eq!(empty.status().as_u16(), 400);
    assert_eq!(manager_delete.status().as_u16(), 403);
    assert_eq!(admin_delete.status().as_u16(), 204);
    assert_eq!(gone.status().as_u16(), 404);
}

#[tokio::test]
async fn reservation_round_trip() {
    // Arrange
    let app = TestApp::spawn().await;
    let manager = app.user(Some(roles::MANAGER)).await;
    let asset_id = app.create_asset(&manager.access_token, "Steadicam").await;
    let window = json!({
        "asset_id": asset_id,
        "starts_at": "2024-07-01T08:00:00",
        "ends_at": "2024-07-03T18:00:00",
        "notes": "Second unit"
    });

    // Act
    let created = app.post("/reservations", &manager.access_token, &window).await;
    let clash = app.post("/reservations", &manager.access_token, &window).await;

    // Assert
    assert_eq!(created.status().as_u16(), 201);
    let created: Value = created.json().await.unwrap();
    assert_eq!(created["reservation"]["status"], "reserved");
    assert_eq!(created["reservation"]["user_id"], manager.id);
    assert_eq!(clash.status().as_u16(), 409);

    let id = created["reservation"]["id"].as_i64().unwrap();
    let out = app
        .post(
            &format!("/reservations/{}/checkout", id),
            &manager.access_token,
            &json!({}),
        )
        .await;
    let cancel = app
        .post(
            &format!("/reservations/{}/cancel", id),
            &manager.access_token,
            &json!({}),
        )
        .await;
    let back = app
        .post(
            &format!("/reservations/{}/return", id),
            &manager.access_token,
            &json!({}),
        )
        .await;

    assert_eq!(out.status().as_u16(), 200);
    assert_eq!(cancel.status().as_u16(), 400);
    assert_eq!(back.status().as_u16(), 200);
    let back: Value = back.json().await.unwrap();
    assert_eq!(back["reservation"]["status"], "returned");

    let listed: Value = app
        .get(
            &format!("/reservations?asset_id={}", asset_id),
            &manager.access_token,
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn owner_may_cancel_but_not_check_out() {
    // Arrange
    let app = TestApp::spawn().await;
    let manager = app.user(Some(roles::MANAGER)).await;
    let crew = app.user(None).await;
    let asset_id = app.create_asset(&manager.access_token, "Walkie set").await;
    let created: Value = app
        .post(
            "/reservations",
            &manager.access_token,
            &json!({
                "asset_id": asset_id,
                "user_id": crew.id,
                "starts_at": "2024-08-01T06:00:00",
                "ends_at": "2024-08-01T20:00:00"
            }),
        )
        .await
        .json()
        .await
        .unwrap();
    let id = created["reservation"]["id"].as_i64().unwrap();

    // Act
    let checkout = app
        .post(
            &format!("/reservations/{}/checkout", id),
            &crew.access_token,
            &json!({}),
        )
        .await;
    let cancel = app
        .post(
            &format!("/reservations/{}/cancel", id),
            &crew.access_token,
            &json!({}),
        )
        .await;

    // Assert
    assert_eq!(checkout.status().as_u16(), 403);
    assert_eq!(cancel.status().as_u16(), 200);
    let cancel: Value = cancel.json().await.unwrap();
    assert_eq!(cancel["reservation"]["status"], "cancelled");
}

#[tokio::test]
async fn reservation_window_is_validated() {
    let app = TestApp::spawn().await;
    let manager = app.user(Some(roles::MANAGER)).await;
    let asset_id = app.create_asset(&manager.access_token, "Jib arm").await;

    let response = app
        .post(
            "/reservations",
            &manager.access_token,
            &json!({
                "asset_id": asset_id,
                "starts_at": "2024-07-05T08:00:00",
                "ends_at": "2024-07-04T08:00:00"
            }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn checking_own_permissions() {
    // Arrange
    let app = TestApp::spawn().await;
    let viewer = app.user(Some(roles::VIEWER)).await;

    // Act
    let response = app
        .post(
            "/permissions/check",
            &viewer.access_token,
            &json!({ "permission": "can_view_archived_assets" }),
        )
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user_id"], viewer.id);
    assert_eq!(body["access"], "denied");
    assert_eq!(body["allowed"], false);
}

#[tokio::test]
async fn checking_someone_else_needs_user_management() {
    // Arrange
    let app = TestApp::spawn().await;
    let viewer = app.user(Some(roles::VIEWER)).await;
    let manager = app.user(Some(roles::MANAGER)).await;
    let admin = app.user(Some(roles::ADMIN)).await;
    let question = json!({ "user_id": manager.id, "permission": "can_archive_assets" });

    // Act
    let as_viewer = app
        .post("/permissions/check", &viewer.access_token, &question)
        .await;
    let as_admin = app
        .post("/permissions/check", &admin.access_token, &question)
        .await;
    let unknown = app
        .post(
            "/permissions/check",
            &admin.access_token,
            &json!({ "user_id": 987654, "permission": "can_archive_assets" }),
        )
        .await;

    // Assert
    assert_eq!(as_viewer.status().as_u16(), 403);
    assert_eq!(as_admin.status().as_u16(), 200);
    let body: Value = as_admin.json().await.unwrap();
    assert_eq!(body["access"], "allowed");
    let body: Value = unknown.json().await.unwrap();
    assert_eq!(body["access"], "not_found");
}

#[tokio::test]
async fn archived_account_loses_its_permissions() {
    // Arrange
    let app = TestApp::spawn().await;
    let manager = app.user(Some(roles::MANAGER)).await;
    users::archive(&mut app.conn(), None, manager.id).unwrap();

    // Act
    let response = app
        .post("/assets", &manager.access_token, &json!({ "name": "Dolly track" }))
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn page_far_past_the_end_is_empty() {
    let app = TestApp::spawn().await;
    let manager = app.user(Some(roles::MANAGER)).await;
    app.create_asset(&manager.access_token, "C-stand").await;

    let response = app
        .get("/assets?page=9223372036854775807", &manager.access_token)
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert!(body["data"].as_array().unwrap().is_empty());
    assert_eq!(body["pagination"]["total_count"], 1);
}

#[tokio::test]
async fn reserving_for_an_unknown_user_is_not_found() {
    // Arrange
    let app = TestApp::spawn().await;
    let manager = app.user(Some(roles::MANAGER)).await;
    let asset_id = app.create_asset(&manager.access_token, "Slider").await;

    // Act
    let response = app
        .post(
            "/reservations",
            &manager.access_token,
            &json!({
                "asset_id": asset_id,
                "user_id": 9999,
                "starts_at": "2024-07-01T08:00:00",
                "ends_at": "2024-07-02T08:00:00"
            }),
        )
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "USER_NOT_FOUND");
}

#[tokio::test]
async fn reserving_for_someone_else_needs_update_permission() {
    // Arrange
    let app = TestApp::spawn().await;
    {
        let mut conn = app.conn();
        roles::create_role(&mut conn, None, "booker", None).unwrap();
        roles::grant(&mut conn, "booker", "can_create_reservations").unwrap();
    }
    let manager = app.user(Some(roles::MANAGER)).await;
    let booker = app.user(Some("booker")).await;
    let asset_id = app.create_asset(&manager.access_token, "Fog machine").await;

    // Act
    let for_manager = app
        .post(
            "/reservations",
            &booker.access_token,
            &json!({
                "asset_id": asset_id,
                "user_id": manager.id,
                "starts_at": "2024-07-01T08:00:00",
                "ends_at": "2024-07-02T08:00:00"
            }),
        )
        .await;
    let for_self = app
        .post(
            "/reservations",
            &booker.access_token,
            &json!({
                "asset_id": asset_id,
                "starts_at": "2024-07-01T08:00:00",
                "ends_at": "2024-07-02T08:00:00"
            }),
        )
        .await;
    let on_behalf = app
        .post(
            "/reservations",
            &manager.access_token,
            &json!({
                "asset_id": asset_id,
                "user_id": booker.id,
                "starts_at": "2024-07-03T08:00:00",
                "ends_at": "2024-07-04T08:00:00"
            }),
        )
        .await;

    // Assert
    assert_eq!(for_manager.status().as_u16(), 403);
    assert_eq!(for_self.status().as_u16(), 201);
    let for_self: Value = for_self.json().await.unwrap();
    assert_eq!(for_self["reservation"]["user_id"], booker.id);
    assert_eq!(on_behalf.status().as_u16(), 201);
}
