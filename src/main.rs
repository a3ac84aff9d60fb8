use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use exampaper_backend::{
    config::{get_config, init_config},
    middleware::{cors::permissive_cors, rate_limit},
    routes, AppState,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let app_state = AppState::new();

    let base_routes = Router::new().route("/health", get(routes::health::health));

    let generate_api = Router::new()
        .route(
            "/api/generate-questions",
            post(routes::generate::generate_questions),
        )
        .route(
            "/api/documents/merge",
            post(routes::documents::merge_documents),
        )
        .layer(axum::middleware::from_fn_with_state(
            rate_limit::RateLimiter::per_second(config.generate_rps),
            rate_limit::rps_middleware,
        ));

    let proxy_api = Router::new()
        .route("/api/proxy", post(routes::proxy::forward))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit::RateLimiter::per_second(config.proxy_rps),
            rate_limit::rps_middleware,
        ));

    let app = base_routes
        .merge(generate_api)
        .merge(proxy_api)
        .with_state(app_state)
        .layer(permissive_cors())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(50 * 1024 * 1024));

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
