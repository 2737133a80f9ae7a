//! HTTP surface tests driving the router directly with tower.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use gatecheck::api::{build_router, AppState};
use gatecheck::registry::{Mode, ScanManager};

use common::*;

fn app(mode: Mode) -> (Router, Arc<ScanManager>) {
    let ctx = context(1);
    let tree = site_tree(
        &ctx,
        vec![
            recorded_node(&format!("{BASE}/app/admin")),
            recorded_node(&format!("{BASE}/app/public")),
        ],
    );
    let test = collaborators(Arc::new(MockReplay::new(200)));
    let manager = Arc::new(ScanManager::new(tree, test.collaborators));
    manager.register_users(1, vec![user(2, "admin")]);
    manager.set_mode(mode);
    (
        build_router(AppState {
            manager: manager.clone(),
        }),
        manager,
    )
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_endpoint_responds() {
    let (app, _) = app(Mode::Standard);
    let response = app.oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn starting_a_scan_on_an_unknown_context_is_404() {
    let (app, _) = app(Mode::Standard);
    let response = app
        .oneshot(post_json("/api/contexts/99/scan", r#"{"user_ids":[2]}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn starting_a_scan_with_an_unknown_user_is_400() {
    let (app, _) = app(Mode::Standard);
    let response = app
        .oneshot(post_json("/api/contexts/1/scan", r#"{"user_ids":[42]}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn safe_mode_refuses_scan_starts_with_403() {
    let (app, _) = app(Mode::Safe);
    let response = app
        .oneshot(post_json("/api/contexts/1/scan", r#"{"user_ids":[2]}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn status_is_not_running_before_any_scan() {
    let (app, _) = app(Mode::Standard);
    let response = app
        .oneshot(get("/api/contexts/1/scan/status"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "NOT RUNNING");
}

#[tokio::test]
async fn results_before_any_scan_are_404() {
    let (app, _) = app(Mode::Standard);
    let response = app
        .oneshot(get("/api/contexts/1/scan/results"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn a_scan_started_over_http_produces_results_and_a_report() {
    let (app, manager) = app(Mode::Standard);

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/contexts/1/scan",
            r#"{"user_ids":[2],"include_unauthenticated":true,"risk_level":"high"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    // Poll until the worker finishes.
    for _ in 0..100 {
        if manager.scan_status(1) == "NOT RUNNING" && manager.scanner(1).unwrap().has_run() {
            if manager.scanner(1).unwrap().last_results().is_some() {
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let response = app
        .clone()
        .oneshot(get("/api/contexts/1/scan/results"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    // 2 nodes x (admin + unauthenticated).
    assert_eq!(json["total"], 4);

    let response = app
        .clone()
        .oneshot(get("/api/contexts/1/scan/progress"))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["percent"], 100);

    let response = app
        .oneshot(get("/api/contexts/1/scan/report"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("unauthenticated"));
    assert!(html.contains("admin"));
}

#[tokio::test]
async fn pause_and_stop_without_a_scan_are_404() {
    let (app, _) = app(Mode::Standard);
    let response = app
        .clone()
        .oneshot(post_json("/api/contexts/1/scan/pause", "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(post_json("/api/contexts/1/scan/stop", "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
