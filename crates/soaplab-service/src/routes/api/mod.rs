use crate::AppState;
use crate::ratelimit::RateLimiter;
use axum::Router;

pub mod v1;

pub fn create_api_router<S: AppState>(limiter: RateLimiter) -> Router<S> {
    Router::new().nest("/v1", v1::create_api_v1_router(limiter))
}
