mod common;

use std::env;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{header, Request, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use exampaper_backend::{routes, AppState};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;

#[derive(Clone)]
struct Target {
    healthy: Arc<AtomicBool>,
    hits: Arc<AtomicUsize>,
    reply: &'static str,
}

async fn target_handler(State(target): State<Target>) -> impl IntoResponse {
    target.hits.fetch_add(1, Ordering::SeqCst);
    if target.healthy.load(Ordering::SeqCst) {
        Json(json!({ "questions": target.reply })).into_response()
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
    }
}

async fn spawn_target(healthy: bool, reply: &'static str) -> (String, Target) {
    let target = Target {
        healthy: Arc::new(AtomicBool::new(healthy)),
        hits: Arc::new(AtomicUsize::new(0)),
        reply,
    };
    let router = Router::new()
        .route("/generate-questions", post(target_handler))
        .with_state(target.clone());
    let base = common::spawn_server(router).await;
    (format!("{}/generate-questions", base), target)
}

async fn json_body(response: axum::response::Response) -> JsonValue {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn proxy_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/proxy")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("proxy request")
}

#[tokio::test]
async fn proxy_flow_end_to_end() {
    let (url_down, down) = spawn_target(false, "never").await;
    let (url_up, up) = spawn_target(true, "Q1. proxied question?").await;

    env::set_var("SERVER_ADDRESS", "127.0.0.1:0");
    env::set_var("UPSTREAM_URL", "http://127.0.0.1:9/generate-questions");
    env::set_var("PROXY_TARGETS", format!("{},{}", url_down, url_up));
    env::set_var("PROXY_ATTEMPTS", "2");
    env::set_var("PROXY_ATTEMPT_TIMEOUT_SECS", "2");
    env::set_var("PROXY_CACHE_TTL_SECS", "3600");
    exampaper_backend::config::init_config().expect("init config");

    let app = Router::new()
        .route("/api/proxy", post(routes::proxy::forward))
        .with_state(AppState::new());

    // First target burns its bounded attempts, second serves.
    let response = app
        .clone()
        .oneshot(proxy_request(r#"{"query":"make questions"}"#))
        .await
        .expect("proxy response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("x-proxy-cache")
            .and_then(|v| v.to_str().ok()),
        Some("miss")
    );
    let body = json_body(response).await;
    assert_eq!(body["questions"], "Q1. proxied question?");
    assert_eq!(down.hits.load(Ordering::SeqCst), 2, "two attempts per target");
    assert_eq!(up.hits.load(Ordering::SeqCst), 1);

    // Upstream dies entirely: the last known-good response is served.
    up.healthy.store(false, Ordering::SeqCst);
    let response = app
        .clone()
        .oneshot(proxy_request(r#"{"query":"make questions"}"#))
        .await
        .expect("cached response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("x-proxy-cache")
            .and_then(|v| v.to_str().ok()),
        Some("hit")
    );
    let body = json_body(response).await;
    assert_eq!(body["questions"], "Q1. proxied question?");

    // A request that was never answered has nothing to fall back on.
    let response = app
        .clone()
        .oneshot(proxy_request(r#"{"query":"something else entirely"}"#))
        .await
        .expect("failing response");
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Server busy, please try again.");
}
