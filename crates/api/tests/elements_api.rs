//! Element identity, remap, history and milestone endpoints.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, post_json};
use serde_json::json;
use sqlx::PgPool;

const GUID: &str = "0K7w7JCMv2xhf2Lpy5O4Tq";
const RENAMED: &str = "3vB2YO$MX4xv5uCqZZG05x";

#[sqlx::test(migrations = "../../db/migrations")]
async fn element_is_found_by_id_and_guid(pool: PgPool) {
    let project_id = common::create_project(&pool).await;
    let element_id = common::create_element(&pool, project_id, GUID).await;

    let response = get(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/projects/{project_id}/elements/{element_id}"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let element = body_json(response).await["data"].clone();
    assert_eq!(element["guid"], GUID);
    assert_eq!(element["assembly_mark"], "C4");
    assert_eq!(element["created_by"], "ines");

    let response = get(
        common::build_test_app(pool),
        &format!("/api/v1/projects/{project_id}/elements/by-guid/{GUID}"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["id"], element_id);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn duplicate_guid_is_a_conflict(pool: PgPool) {
    let project_id = common::create_project(&pool).await;
    common::create_element(&pool, project_id, GUID).await;

    let response = post_json(
        common::build_test_app(pool),
        &format!("/api/v1/projects/{project_id}/elements"),
        json!({ "guid": GUID }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "DUPLICATE_GUID");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn remap_renames_and_keeps_the_old_guid(pool: PgPool) {
    let project_id = common::create_project(&pool).await;
    let element_id = common::create_element(&pool, project_id, GUID).await;

    let response = post_json(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/projects/{project_id}/elements/remap"),
        json!({ "old_guid": GUID, "new_guid": RENAMED }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let element = body_json(response).await["data"].clone();
    assert_eq!(element["id"], element_id);
    assert_eq!(element["guid"], RENAMED);
    assert_eq!(element["guid_history"][0]["old_guid"], GUID);

    let response = get(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/projects/{project_id}/elements/by-guid/{GUID}"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(
        common::build_test_app(pool),
        &format!("/api/v1/projects/{project_id}/elements/{element_id}/history"),
    )
    .await;
    let history = body_json(response).await["data"].clone();
    assert_eq!(history[0]["action"], "guid_changed");
    assert_eq!(history[0]["state"]["guid"], RENAMED);
    assert_eq!(history[1]["action"], "create");
    assert_eq!(history[1]["state"]["guid"], GUID);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn remap_onto_a_held_guid_is_a_conflict(pool: PgPool) {
    let project_id = common::create_project(&pool).await;
    common::create_element(&pool, project_id, GUID).await;
    common::create_element(&pool, project_id, RENAMED).await;

    let response = post_json(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/projects/{project_id}/elements/remap"),
        json!({ "old_guid": GUID, "new_guid": RENAMED }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "CONFLICTING_GUID");

    let response = post_json(
        common::build_test_app(pool),
        &format!("/api/v1/projects/{project_id}/elements/remap"),
        json!({ "old_guid": GUID, "new_guid": GUID }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn milestones_are_recorded_once(pool: PgPool) {
    let project_id = common::create_project(&pool).await;
    let element_id = common::create_element(&pool, project_id, GUID).await;
    let arrival = format!("/api/v1/projects/{project_id}/elements/{element_id}/arrival");

    let response = post_json(
        common::build_test_app(pool.clone()),
        &arrival,
        json!({ "at": "2026-03-02T07:30:00Z" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let element = body_json(response).await["data"].clone();
    assert_eq!(element["arrived_by"], "ines");
    assert!(element["arrived_at"].as_str().unwrap().starts_with("2026-03-02T07:30:00"));

    let response = post_json(common::build_test_app(pool.clone()), &arrival, json!({})).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = post_json(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/projects/{project_id}/elements/{element_id}/installation"),
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(
        common::build_test_app(pool),
        &format!("/api/v1/projects/{project_id}/elements/stats"),
    )
    .await;
    let stats = body_json(response).await["data"].clone();
    assert_eq!(stats["total"], 1);
    assert_eq!(stats["arrived"], 1);
    assert_eq!(stats["installed"], 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn groups_and_plan_items_reference_elements(pool: PgPool) {
    let project_id = common::create_project(&pool).await;
    common::create_element(&pool, project_id, GUID).await;
    common::create_element(&pool, project_id, RENAMED).await;

    let response = post_json(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/projects/{project_id}/groups"),
        json!({ "name": "Level 2 columns", "member_guids": [GUID, RENAMED] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = post_json(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/projects/{project_id}/groups"),
        json!({ "name": "Ghosts", "member_guids": ["1xxxxxxxxxxxxxxxxxxxxx"] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/projects/{project_id}/groups"),
    )
    .await;
    assert_eq!(body_json(response).await["data"].as_array().unwrap().len(), 1);

    let response = post_json(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/projects/{project_id}/plan-items"),
        json!({ "element_guid": GUID, "kind": "installation", "planned_date": "2026-04-01" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = get(
        common::build_test_app(pool),
        &format!("/api/v1/projects/{project_id}/plan-items?guid={GUID}"),
    )
    .await;
    let items = body_json(response).await["data"].clone();
    assert_eq!(items.as_array().unwrap().len(), 1);
    assert_eq!(items[0]["planned_date"], "2026-04-01");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn group_history_follows_member_remaps(pool: PgPool) {
    const MOVED: &str = "1hOSvn6df7F8_7GcBWlRGQ";
    let project_id = common::create_project(&pool).await;
    common::create_element(&pool, project_id, GUID).await;
    common::create_element(&pool, project_id, RENAMED).await;

    let response = post_json(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/projects/{project_id}/groups"),
        json!({ "name": "Level 2 columns", "member_guids": [GUID, RENAMED] }),
    )
    .await;
    let group_id = body_json(response).await["data"]["id"].as_i64().unwrap();

    let response = post_json(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/projects/{project_id}/elements/remap"),
        json!({ "old_guid": GUID, "new_guid": MOVED }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(
        common::build_test_app(pool),
        &format!("/api/v1/projects/{project_id}/groups/{group_id}/history"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let items = body_json(response).await["data"].clone();
    assert_eq!(items.as_array().unwrap().len(), 2);
    assert_eq!(items[0]["action"], "guid_changed");
    assert_eq!(items[0]["state"]["member_guids"], json!([MOVED, RENAMED]));
    assert_eq!(items[1]["action"], "create");
    assert_eq!(items[1]["state"]["member_guids"], json!([GUID, RENAMED]));
}
