mod common;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use exampaper_backend::error::Error;
use exampaper_backend::models::dispatch::EndpointCandidate;
use exampaper_backend::services::dispatch_service::DispatchService;
use exampaper_backend::services::generation_service::GenerationService;
use serde_json::json;

enum Step {
    Ok(&'static str),
    Fail,
}

#[derive(Clone)]
struct Scripted {
    steps: Arc<Mutex<VecDeque<Step>>>,
    hits: Arc<AtomicUsize>,
}

async fn scripted_handler(State(s): State<Scripted>) -> Response {
    s.hits.fetch_add(1, Ordering::SeqCst);
    match s.steps.lock().expect("steps lock").pop_front() {
        Some(Step::Ok(text)) => Json(json!({ "questions": text })).into_response(),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
    }
}

async fn spawn_scripted(steps: Vec<Step>) -> (Vec<EndpointCandidate>, Arc<AtomicUsize>) {
    let scripted = Scripted {
        steps: Arc::new(Mutex::new(steps.into())),
        hits: Arc::new(AtomicUsize::new(0)),
    };
    let hits = scripted.hits.clone();
    let router = Router::new()
        .route("/generate-questions", post(scripted_handler))
        .with_state(scripted);
    let base = common::spawn_server(router).await;
    let candidates = vec![EndpointCandidate::direct(
        format!("{}/generate-questions", base),
        Duration::from_secs(5),
    )];
    (candidates, hits)
}

fn service(attempts: u32) -> GenerationService {
    GenerationService::new(DispatchService::new(reqwest::Client::new()), 30, attempts)
}

#[tokio::test]
async fn batches_run_sequentially_and_aggregate_in_order() {
    let (candidates, hits) = spawn_scripted(vec![
        Step::Ok("Q1. alpha?"),
        Step::Ok("Q1. beta?"),
        Step::Ok("Q1. gamma?"),
    ])
    .await;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let result = service(3)
        .generate_batched(
            65,
            Some(30),
            |n| format!("give me {} items", n),
            None,
            &candidates,
            Some(tx),
        )
        .await
        .expect("batched generation");

    assert_eq!(hits.load(Ordering::SeqCst), 3);

    let alpha = result.text.find("alpha").expect("alpha present");
    let beta = result.text.find("beta").expect("beta present");
    let gamma = result.text.find("gamma").expect("gamma present");
    assert!(alpha < beta && beta < gamma, "batches must never reorder");

    // Three items against a request for 65: advisory mismatch only.
    assert_eq!(result.detected, 3);
    assert!(!result.count_matches_requested);

    let mut updates = Vec::new();
    while let Some(progress) = rx.recv().await {
        updates.push(progress);
    }
    assert_eq!(updates.len(), 3);
    assert_eq!(
        updates.iter().map(|p| p.batch_index).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert!(updates[0].partial_text.contains("alpha"));
    assert!(!updates[0].partial_text.contains("beta"));
    assert!(updates[2].partial_text.contains("gamma"));
}

#[tokio::test]
async fn failed_attempts_back_off_before_retrying() {
    let (candidates, hits) =
        spawn_scripted(vec![Step::Fail, Step::Fail, Step::Ok("Q1. finally?")]).await;

    let started = Instant::now();
    let result = service(3)
        .generate_batched(
            1,
            None,
            |n| format!("give me {} items", n),
            None,
            &candidates,
            None,
        )
        .await
        .expect("recovered generation");

    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert!(result.text.contains("finally"));
    // 500 ms + 1000 ms of backoff between the three attempts.
    assert!(started.elapsed() >= Duration::from_millis(1400));
}

#[tokio::test]
async fn exhausted_batch_is_a_hard_failure() {
    let (candidates, hits) = spawn_scripted(vec![Step::Fail, Step::Fail]).await;

    let result = service(2)
        .generate_batched(
            1,
            None,
            |n| format!("give me {} items", n),
            None,
            &candidates,
            None,
        )
        .await;

    match result {
        Err(Error::BatchExhausted { batch, attempts }) => {
            assert_eq!(batch, 0);
            assert_eq!(attempts, 2);
        }
        other => panic!("expected BatchExhausted, got {:?}", other.map(|r| r.text)),
    }
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn zero_count_is_rejected_before_any_upstream_call() {
    let (candidates, hits) = spawn_scripted(vec![Step::Ok("Q1. unused?")]).await;

    let result = service(3)
        .generate_batched(
            0,
            None,
            |n| format!("give me {} items", n),
            None,
            &candidates,
            None,
        )
        .await;

    assert!(matches!(result, Err(Error::BadRequest(_))));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}
