use crate::AppState;
use crate::ratelimit::RateLimiter;
use axum::{Router, routing::get};

pub mod api;

async fn health() -> &'static str {
    "OK"
}

pub fn create_router<S: AppState>(limiter: RateLimiter) -> Router<S> {
    Router::new()
        .route("/health", get(health))
        .nest("/api", api::create_api_router(limiter))
}
