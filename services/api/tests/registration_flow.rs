mod common;
mod http_helpers;

use axum::http::StatusCode;
use common::{TestApp, read_json};
use http_helpers::{authed, authed_json, get};
use shovel_authz::Role;
use tower::ServiceExt;

struct Site {
    grid_id: String,
    manager_token: String,
}

/// An admin-created area with one grid owned by a freshly created manager.
async fn site(harness: &TestApp) -> Site {
    let (_admin, admin_token) = harness.user("Admin", Role::Admin).await;
    let (manager, manager_token) = harness.user("Manager", Role::GridManager).await;
    let area = read_json(
        harness
            .app
            .clone()
            .oneshot(authed_json(
                "POST",
                "/v1/disaster-areas",
                &admin_token,
                serde_json::json!({ "name": "Guangfu" }),
            ))
            .await
            .expect("area"),
    )
    .await;

    let response = harness
        .app
        .clone()
        .oneshot(authed_json(
            "POST",
            "/v1/grids",
            &manager_token,
            serde_json::json!({
                "disaster_area_id": area["id"],
                "code": "M-7",
                "grid_type": "manpower",
                "volunteer_needed": 3
            }),
        ))
        .await
        .expect("grid");
    assert_eq!(response.status(), StatusCode::CREATED);
    let grid = read_json(response).await;
    assert_eq!(grid["grid_manager_id"], manager.id.to_string());
    Site {
        grid_id: grid["id"].as_str().expect("grid id").to_string(),
        manager_token,
    }
}

async fn register(harness: &TestApp, token: &str, grid_id: &str) -> (StatusCode, serde_json::Value) {
    let response = harness
        .app
        .clone()
        .oneshot(authed_json(
            "POST",
            "/v1/volunteer-registrations",
            token,
            serde_json::json!({
                "grid_id": grid_id,
                "volunteer_name": "Mei",
                "volunteer_phone": "0912345678",
                "skills": ["digging"]
            }),
        ))
        .await
        .expect("register");
    let status = response.status();
    (status, read_json(response).await)
}

async fn set_status(
    harness: &TestApp,
    token: &str,
    registration_id: &str,
    status: &str,
) -> (StatusCode, serde_json::Value) {
    let response = harness
        .app
        .clone()
        .oneshot(authed_json(
            "PUT",
            &format!("/v1/volunteer-registrations/{registration_id}"),
            token,
            serde_json::json!({ "status": status }),
        ))
        .await
        .expect("update registration");
    let code = response.status();
    (code, read_json(response).await)
}

async fn registered_count(harness: &TestApp, grid_id: &str) -> i64 {
    let response = harness
        .app
        .clone()
        .oneshot(get(&format!("/v1/grids/{grid_id}")))
        .await
        .expect("grid");
    read_json(response).await["volunteer_registered"]
        .as_i64()
        .expect("count")
}

#[tokio::test]
async fn registration_walks_the_status_machine() {
    let harness = TestApp::new();
    let site = site(&harness).await;
    let (volunteer, volunteer_token) = harness.user("Mei", Role::User).await;

    let (status, registration) = register(&harness, &volunteer_token, &site.grid_id).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(registration["status"], "pending");
    assert_eq!(registration["user_id"], volunteer.id.to_string());
    let id = registration["id"].as_str().expect("id").to_string();
    assert_eq!(registered_count(&harness, &site.grid_id).await, 1);

    let (status, body) = register(&harness, &volunteer_token, &site.grid_id).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "already_exists");

    let (status, _) = set_status(&harness, &volunteer_token, &id, "confirmed").await;
    assert_eq!(status, StatusCode::FORBIDDEN, "volunteers cannot confirm themselves");

    let (status, body) = set_status(&harness, &site.manager_token, &id, "confirmed").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "confirmed");

    let (status, body) = set_status(&harness, &site.manager_token, &id, "confirmed").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_transition");

    let (status, _) = set_status(&harness, &volunteer_token, &id, "arrived").await;
    assert_eq!(status, StatusCode::OK, "volunteers may check in");

    let (status, _) = set_status(&harness, &volunteer_token, &id, "completed").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = set_status(&harness, &site.manager_token, &id, "completed").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = set_status(&harness, &volunteer_token, &id, "cancelled").await;
    assert_eq!(status, StatusCode::CONFLICT, "completed is terminal");
    assert_eq!(body["code"], "invalid_transition");
}

#[tokio::test]
async fn cancelling_frees_the_slot() {
    let harness = TestApp::new();
    let site = site(&harness).await;
    let (_volunteer, volunteer_token) = harness.user("Mei", Role::User).await;

    let (_, registration) = register(&harness, &volunteer_token, &site.grid_id).await;
    let id = registration["id"].as_str().expect("id").to_string();

    let (status, _) = set_status(&harness, &volunteer_token, &id, "cancelled").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(registered_count(&harness, &site.grid_id).await, 0);

    let (status, _) = register(&harness, &volunteer_token, &site.grid_id).await;
    assert_eq!(status, StatusCode::CREATED, "a cancelled sign-up does not block a new one");
}

#[tokio::test]
async fn registrations_are_private_to_owner_manager_and_admin() {
    let harness = TestApp::new();
    let site = site(&harness).await;
    let (_volunteer, volunteer_token) = harness.user("Mei", Role::User).await;
    let (_stranger, stranger_token) = harness.user("Chen", Role::User).await;

    let (_, registration) = register(&harness, &volunteer_token, &site.grid_id).await;
    let id = registration["id"].as_str().expect("id").to_string();
    let list_uri = format!("/v1/volunteer-registrations?grid_id={}", site.grid_id);

    for (token, expected) in [
        (&volunteer_token, 1),
        (&site.manager_token, 1),
        (&stranger_token, 0),
    ] {
        let response = harness
            .app
            .clone()
            .oneshot(authed("GET", &list_uri, token))
            .await
            .expect("list registrations");
        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json(response).await;
        assert_eq!(payload["items"].as_array().expect("items").len(), expected);
    }

    let (status, _) = set_status(&harness, &stranger_token, &id, "cancelled").await;
    assert_eq!(status, StatusCode::NOT_FOUND, "hidden rows look absent");

    let response = harness
        .app
        .clone()
        .oneshot(authed(
            "DELETE",
            &format!("/v1/volunteer-registrations/{id}"),
            &stranger_token,
        ))
        .await
        .expect("stranger delete");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = harness
        .app
        .clone()
        .oneshot(authed(
            "DELETE",
            &format!("/v1/volunteer-registrations/{id}"),
            &volunteer_token,
        ))
        .await
        .expect("owner delete");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn closed_grids_refuse_sign_ups() {
    let harness = TestApp::new();
    let (_admin, admin_token) = harness.user("Admin", Role::Admin).await;
    let (_volunteer, volunteer_token) = harness.user("Mei", Role::User).await;
    let area = read_json(
        harness
            .app
            .clone()
            .oneshot(authed_json(
                "POST",
                "/v1/disaster-areas",
                &admin_token,
                serde_json::json!({ "name": "Guangfu" }),
            ))
            .await
            .expect("area"),
    )
    .await;
    let grid = read_json(
        harness
            .app
            .clone()
            .oneshot(authed_json(
                "POST",
                "/v1/grids",
                &admin_token,
                serde_json::json!({
                    "disaster_area_id": area["id"],
                    "code": "C-1",
                    "grid_type": "food",
                    "status": "closed"
                }),
            ))
            .await
            .expect("grid"),
    )
    .await;
    let grid_id = grid["id"].as_str().expect("grid id");

    let (status, body) = register(&harness, &volunteer_token, grid_id).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "grid_not_open");
}

#[tokio::test]
async fn volunteer_roster_masks_phones() {
    let harness = TestApp::new();
    let site = site(&harness).await;
    let (_volunteer, volunteer_token) = harness.user("Mei", Role::User).await;
    let (_other, other_token) = harness.user("Chen", Role::User).await;
    register(&harness, &volunteer_token, &site.grid_id).await;
    let roster_uri = format!("/v1/volunteers?grid_id={}", site.grid_id);

    let response = harness
        .app
        .clone()
        .oneshot(get(&roster_uri))
        .await
        .expect("anonymous roster");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["can_view_phone"], false);
    assert_eq!(payload["total"], 1);
    assert_eq!(payload["status_counts"]["pending"], 1);
    assert_eq!(payload["status_counts"]["completed"], 0);
    assert_eq!(payload["items"][0]["volunteer_phone"], "0912***678");

    let response = harness
        .app
        .clone()
        .oneshot(authed("GET", &roster_uri, &other_token))
        .await
        .expect("other user roster");
    let payload = read_json(response).await;
    assert_eq!(payload["items"][0]["volunteer_phone"], "0912***678");

    let response = harness
        .app
        .clone()
        .oneshot(authed("GET", &roster_uri, &volunteer_token))
        .await
        .expect("own roster");
    let payload = read_json(response).await;
    assert_eq!(payload["can_view_phone"], false);
    assert_eq!(payload["items"][0]["volunteer_phone"], "0912345678");

    let response = harness
        .app
        .clone()
        .oneshot(authed("GET", &roster_uri, &site.manager_token))
        .await
        .expect("manager roster");
    let payload = read_json(response).await;
    assert_eq!(payload["can_view_phone"], true);
    assert_eq!(payload["items"][0]["volunteer_phone"], "0912345678");

    let response = harness
        .app
        .clone()
        .oneshot(get("/v1/volunteers"))
        .await
        .expect("missing grid id");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
