use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

#[derive(Debug)]
struct Window {
    opened: Instant,
    used: u32,
}

/// Fixed-window limiter, one window per route group. Generation calls fan out
/// to a slow upstream, so their group gets a much lower budget than the proxy.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    budget: u32,
    window_len: Duration,
    window: Arc<Mutex<Window>>,
}

impl RateLimiter {
    pub fn per_second(budget: u32) -> Self {
        Self {
            budget: budget.max(1),
            window_len: Duration::from_secs(1),
            window: Arc::new(Mutex::new(Window {
                opened: Instant::now(),
                used: 0,
            })),
        }
    }

    fn allow(&self) -> bool {
        let mut guard = self.window.lock().expect("rate limiter mutex poisoned");
        if guard.opened.elapsed() >= self.window_len {
            guard.opened = Instant::now();
            guard.used = 0;
        }
        if guard.used < self.budget {
            guard.used += 1;
            true
        } else {
            false
        }
    }
}

pub async fn rps_middleware(
    State(limiter): State<RateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !limiter.allow() {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "rate_limit_exceeded" })),
        )
            .into_response();
    }
    next.run(req).await
}
