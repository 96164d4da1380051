#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;

use sitecheck_api::config::ServerConfig;
use sitecheck_api::router::build_app_router;
use sitecheck_api::state::AppState;

/// `(x-actor-id, x-actor-role)` pairs used across the suites.
pub type ActorHeaders = (&'static str, &'static str);

pub const INSPECTOR: ActorHeaders = ("ines", "inspector");
pub const REVIEWER: ActorHeaders = ("rein", "reviewer");
pub const ADMIN: ActorHeaders = ("ada", "admin");

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
    }
}

/// Build the full application router, middleware included, over `pool`.
pub fn build_test_app(pool: PgPool) -> Router {
    let state = AppState {
        pool,
        config: Arc::new(test_config()),
    };
    build_app_router(state).unwrap()
}

pub async fn send(
    app: Router,
    method: Method,
    uri: &str,
    actor: Option<ActorHeaders>,
    body: Option<Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((id, role)) = actor {
        builder = builder.header("x-actor-id", id).header("x-actor-role", role);
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

/// POST as the default inspector.
pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(INSPECTOR), Some(body)).await
}

pub async fn post_json_as(app: Router, uri: &str, actor: ActorHeaders, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(actor), Some(body)).await
}

pub async fn put_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(INSPECTOR), Some(body)).await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Create a project over HTTP and return its id.
pub async fn create_project(pool: &PgPool) -> i64 {
    let response = post_json(
        build_test_app(pool.clone()),
        "/api/v1/projects",
        serde_json::json!({ "name": "Harbour Tower" }),
    )
    .await;
    body_json(response).await["data"]["id"].as_i64().unwrap()
}

/// Create an element over HTTP and return its id.
pub async fn create_element(pool: &PgPool, project_id: i64, guid: &str) -> i64 {
    let response = post_json(
        build_test_app(pool.clone()),
        &format!("/api/v1/projects/{project_id}/elements"),
        serde_json::json!({ "guid": guid, "assembly_mark": "C4", "object_type": "IfcColumn" }),
    )
    .await;
    body_json(response).await["data"]["id"].as_i64().unwrap()
}

/// Create a checkpoint on a fresh element and return its id.
pub async fn create_checkpoint(pool: &PgPool, project_id: i64, guid: &str) -> i64 {
    let element_id = create_element(pool, project_id, guid).await;
    let response = post_json(
        build_test_app(pool.clone()),
        &format!("/api/v1/projects/{project_id}/checkpoints"),
        serde_json::json!({ "element_id": element_id, "name": "Anchor bolts" }),
    )
    .await;
    body_json(response).await["data"]["id"].as_i64().unwrap()
}

/// Apply a workflow action to a checkpoint as `actor`.
pub async fn transition(
    pool: &PgPool,
    project_id: i64,
    checkpoint_id: i64,
    actor: ActorHeaders,
    body: Value,
) -> Response<Body> {
    post_json_as(
        build_test_app(pool.clone()),
        &format!("/api/v1/projects/{project_id}/checkpoints/{checkpoint_id}/transitions"),
        actor,
        body,
    )
    .await
}
