//! Project endpoints and request identity handling.

mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, get, post_json, send};
use serde_json::json;
use sqlx::PgPool;

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_project_seeds_local_settings(pool: PgPool) {
    let response = post_json(
        common::build_test_app(pool.clone()),
        "/api/v1/projects",
        json!({ "name": "Harbour Tower" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let project = body_json(response).await["data"].clone();
    assert_eq!(project["name"], "Harbour Tower");
    let id = project["id"].as_i64().unwrap();

    let response = get(
        common::build_test_app(pool),
        &format!("/api/v1/projects/{id}/calibration/settings"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let settings = body_json(response).await["data"].clone();
    assert_eq!(settings["coordinate_system"], "local");
    assert_eq!(settings["model_unit"], "mm");
    assert_eq!(settings["is_calibrated"], false);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_project_validates_input(pool: PgPool) {
    let response = post_json(
        common::build_test_app(pool.clone()),
        "/api/v1/projects",
        json!({ "name": "" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_json(
        common::build_test_app(pool),
        "/api/v1/projects",
        json!({ "name": "Quay", "coordinate_system": "EPSG:4326" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn missing_actor_headers_are_unauthorized(pool: PgPool) {
    let response = send(
        common::build_test_app(pool),
        Method::POST,
        "/api/v1/projects",
        None,
        Some(json!({ "name": "Anonymous" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unknown_role_is_rejected(pool: PgPool) {
    let response = send(
        common::build_test_app(pool),
        Method::POST,
        "/api/v1/projects",
        Some(("mallory", "superuser")),
        Some(json!({ "name": "Quay" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unknown_project_is_404(pool: PgPool) {
    let response = get(common::build_test_app(pool), "/api/v1/projects/999999").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}
