//! Calibration and coordinate conversion endpoints.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, post_json, put_json};
use serde_json::{json, Value};
use sqlx::PgPool;

const LAT: f64 = 59.437;
const LON: f64 = 24.7536;
/// Degrees per 100 m at the test latitude.
const DLAT_100M: f64 = 0.000_898;
const DLON_100M: f64 = 0.001_766_6;

async fn add_point(pool: &PgPool, project_id: i64, x: f64, y: f64, lat: f64, lon: f64) -> Value {
    let response = post_json(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/projects/{project_id}/calibration/points"),
        json!({
            "model": { "x": x, "y": y },
            "gps": { "latitude": lat, "longitude": lon, "accuracy_m": 1.5 },
            "description": "Grid A1",
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"].clone()
}

async fn surveyed_project(pool: &PgPool) -> i64 {
    let project_id = common::create_project(pool).await;
    add_point(pool, project_id, 0.0, 0.0, LAT, LON).await;
    add_point(pool, project_id, 100.0, 0.0, LAT, LON + DLON_100M).await;
    add_point(pool, project_id, 0.0, 100.0, LAT + DLAT_100M, LON).await;
    project_id
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn uncalibrated_project_reports_state_and_refuses_conversion(pool: PgPool) {
    let project_id = common::create_project(&pool).await;

    let response = get(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/projects/{project_id}/calibration/transform"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let status = body_json(response).await["data"].clone();
    assert_eq!(status["status"], "not_calibrated");
    assert_eq!(status["active_points"], 0);

    let response = post_json(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/projects/{project_id}/convert/model-to-gps"),
        json!({ "x": 10.0, "y": 10.0 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "NOT_CALIBRATED");

    let response = get(
        common::build_test_app(pool),
        &format!("/api/v1/projects/{project_id}/calibration/accuracy"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn three_points_give_an_affine_fit(pool: PgPool) {
    let project_id = surveyed_project(&pool).await;

    let response = get(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/projects/{project_id}/calibration/transform"),
    )
    .await;
    let status = body_json(response).await["data"].clone();
    assert_eq!(status["status"], "calibrated");
    assert_eq!(status["transform"]["kind"], "affine");
    assert_eq!(status["transform"]["point_count"], 3);

    let response = post_json(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/projects/{project_id}/convert/model-to-gps"),
        json!({ "x": 100.0, "y": 0.0 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let gps = body_json(response).await["data"].clone();
    assert!((gps["latitude"].as_f64().unwrap() - LAT).abs() < 1e-6);
    assert!((gps["longitude"].as_f64().unwrap() - (LON + DLON_100M)).abs() < 1e-6);

    let response = get(
        common::build_test_app(pool),
        &format!("/api/v1/projects/{project_id}/calibration/accuracy"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let accuracy = body_json(response).await["data"].clone();
    assert_eq!(accuracy["points"].as_array().unwrap().len(), 3);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn poor_gps_sample_is_stored_with_a_notice(pool: PgPool) {
    let project_id = common::create_project(&pool).await;

    let response = post_json(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/projects/{project_id}/calibration/points"),
        json!({
            "model": { "x": 0.0, "y": 0.0 },
            "gps": { "latitude": LAT, "longitude": LON, "accuracy_m": 25.0 },
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let added = body_json(response).await["data"].clone();
    assert!(added["notice"].as_str().unwrap().contains("25.0"));
    assert_eq!(added["point"]["captured_by"], "ines");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn out_of_range_gps_is_rejected(pool: PgPool) {
    let project_id = common::create_project(&pool).await;

    let response = post_json(
        common::build_test_app(pool),
        &format!("/api/v1/projects/{project_id}/calibration/points"),
        json!({
            "model": { "x": 0.0, "y": 0.0 },
            "gps": { "latitude": 91.0, "longitude": LON },
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn deactivated_points_drop_out_of_the_fit(pool: PgPool) {
    let project_id = surveyed_project(&pool).await;

    let response = get(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/projects/{project_id}/calibration/points"),
    )
    .await;
    let points = body_json(response).await["data"].clone();
    let point_id = points[2]["id"].as_i64().unwrap();

    let response = post_json(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/projects/{project_id}/calibration/points/{point_id}/deactivate"),
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["is_active"], false);

    let response = get(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/projects/{project_id}/calibration/transform"),
    )
    .await;
    let status = body_json(response).await["data"].clone();
    assert_eq!(status["transform"]["kind"], "helmert");

    let response = get(
        common::build_test_app(pool),
        &format!("/api/v1/projects/{project_id}/calibration/points?include_inactive=true"),
    )
    .await;
    assert_eq!(body_json(response).await["data"].as_array().unwrap().len(), 3);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn fixed_projection_converts_without_points(pool: PgPool) {
    let project_id = common::create_project(&pool).await;

    let response = put_json(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/projects/{project_id}/calibration/settings"),
        json!({ "coordinate_system": "EPSG:3857", "model_unit": "m" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["coordinate_system"], "EPSG:3857");

    let response = post_json(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/projects/{project_id}/convert/model-to-gps"),
        json!({ "x": 0.0, "y": 0.0 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let gps = body_json(response).await["data"].clone();
    assert!(gps["latitude"].as_f64().unwrap().abs() < 1e-9);
    assert!(gps["longitude"].as_f64().unwrap().abs() < 1e-9);

    let response = put_json(
        common::build_test_app(pool),
        &format!("/api/v1/projects/{project_id}/calibration/settings"),
        json!({ "coordinate_system": "EPSG:4326" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
