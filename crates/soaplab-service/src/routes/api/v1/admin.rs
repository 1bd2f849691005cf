//! Editor endpoints. Every handler takes [`AdminUser`] first so the gate runs
//! before the body is read or the store is touched.

use axum::{
    Router,
    extract::{
        Json, Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::Json as ResponseJson,
    routing::get,
};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::ListNewsQuery;
use crate::AppState;
use crate::auth::AdminUser;
use crate::errors::ApiError;
use crate::models::{NewsDraft, NewsItem, NewsPatch, Page};
use crate::ratelimit::{RateLimitLayer, RateLimiter};

#[instrument(skip_all, fields(user_id = %admin.identity.user_id))]
async fn list_news<S: AppState>(
    AdminUser(admin): AdminUser,
    State(state): State<S>,
    query: Result<Query<ListNewsQuery>, QueryRejection>,
) -> Result<ResponseJson<Page<NewsItem>>, ApiError> {
    let Query(query) = query?;
    let filters = query.filters()?;

    let page = state.news().list_news(filters, query.page, query.limit).await?;
    debug!(
        returned_count = page.data.len(),
        total = page.pagination.total,
        "Listed news for editor"
    );
    Ok(ResponseJson(page))
}

#[instrument(skip_all, fields(user_id = %admin.identity.user_id))]
async fn create_news<S: AppState>(
    AdminUser(admin): AdminUser,
    State(state): State<S>,
    payload: Result<Json<NewsDraft>, JsonRejection>,
) -> Result<(StatusCode, ResponseJson<NewsItem>), ApiError> {
    let Json(draft) = payload?;

    let item = state
        .news()
        .create_news(draft, admin.identity.user_id)
        .await?;
    info!(id = %item.id, "Editor created news item");
    Ok((StatusCode::CREATED, ResponseJson(item)))
}

#[instrument(skip_all, fields(user_id = %admin.identity.user_id))]
async fn news_by_id<S: AppState>(
    AdminUser(admin): AdminUser,
    State(state): State<S>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<ResponseJson<NewsItem>, ApiError> {
    let Path(id) = path?;
    state
        .news()
        .get_news_by_id(id)
        .await?
        .map(ResponseJson)
        .ok_or(ApiError::NotFound)
}

#[instrument(skip_all, fields(user_id = %admin.identity.user_id))]
async fn update_news<S: AppState>(
    AdminUser(admin): AdminUser,
    State(state): State<S>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<NewsPatch>, JsonRejection>,
) -> Result<ResponseJson<NewsItem>, ApiError> {
    let Path(id) = path?;
    let Json(patch) = payload?;

    let item = state.news().update_news(id, patch).await?;
    info!(%id, published = item.published, "Editor updated news item");
    Ok(ResponseJson(item))
}

#[instrument(skip_all, fields(user_id = %admin.identity.user_id))]
async fn delete_news<S: AppState>(
    AdminUser(admin): AdminUser,
    State(state): State<S>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = path?;

    if state.news().delete_news(id).await? {
        info!(%id, "Editor deleted news item");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

pub fn create_admin_router<S: AppState>(limiter: RateLimiter) -> Router<S> {
    Router::new()
        .route("/news", get(list_news::<S>).post(create_news::<S>))
        .route(
            "/news/{id}",
            get(news_by_id::<S>)
                .put(update_news::<S>)
                .delete(delete_news::<S>),
        )
        .layer(RateLimitLayer::new(limiter))
}
