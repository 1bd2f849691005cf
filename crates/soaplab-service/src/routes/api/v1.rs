use axum::{
    Router,
    extract::{
        Json, Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::AppState;
use crate::auth::{AuthEvent, AuthenticatedUser};
use crate::errors::{ApiError, AuthError};
use crate::models::{NewsFilters, NewsItem, Page, Profile, ProfileChanges};
use crate::ratelimit::RateLimiter;
use crate::repositories::ProfileRepository;
use crate::validation::{validate_category, validate_optional_url};

mod admin;

/// Query string shared by the public and admin listings.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListNewsQuery {
    page: Option<u32>,
    limit: Option<u32>,
    published: Option<bool>,
    category: Option<String>,
    featured: Option<bool>,
    /// Comma-separated
    tags: Option<String>,
    search: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
}

impl ListNewsQuery {
    fn filters(&self) -> Result<NewsFilters, ApiError> {
        let category = match self.category.as_deref().map(str::trim) {
            Some(category) if !category.is_empty() => Some(validate_category(category)?),
            _ => None,
        };

        let tags = self.tags.as_deref().map(|tags| {
            tags.split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        });

        let search = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|search| !search.is_empty())
            .map(str::to_string);

        Ok(NewsFilters {
            published: self.published,
            category,
            featured: self.featured,
            tags: tags.filter(|tags| !tags.is_empty()),
            search,
            date_from: parse_timestamp("date_from", self.date_from.as_deref())?,
            date_to: parse_timestamp("date_to", self.date_to.as_deref())?,
        })
    }
}

fn parse_timestamp(name: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>, ApiError> {
    raw.map(|raw| {
        DateTime::parse_from_rfc3339(raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|_| {
                ApiError::BadRequest(format!(
                    "Invalid '{name}' datetime format. Use RFC3339 format."
                ))
            })
    })
    .transpose()
}

#[derive(Debug, Deserialize)]
struct FeedQuery {
    limit: Option<u32>,
}

#[derive(Debug, Serialize)]
struct TagsResponse {
    tags: Vec<String>,
}

#[instrument(skip_all)]
async fn list_published_news<S: AppState>(
    State(state): State<S>,
    query: Result<Query<ListNewsQuery>, QueryRejection>,
) -> Result<ResponseJson<Page<NewsItem>>, ApiError> {
    let Query(query) = query?;
    let filters = NewsFilters {
        published: Some(true),
        ..query.filters()?
    };

    let page = state.news().list_news(filters, query.page, query.limit).await?;
    info!(
        returned_count = page.data.len(),
        total = page.pagination.total,
        "Listed published news"
    );
    Ok(ResponseJson(page))
}

#[instrument(skip_all)]
async fn recent_news<S: AppState>(
    State(state): State<S>,
    query: Result<Query<FeedQuery>, QueryRejection>,
) -> Result<ResponseJson<Vec<NewsItem>>, ApiError> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(state.news().default_page_size());
    let items = state.news().get_recent_news(limit).await?;
    debug!(returned_count = items.len(), "Loaded recent news");
    Ok(ResponseJson(items))
}

#[instrument(skip_all)]
async fn featured_news<S: AppState>(
    State(state): State<S>,
    query: Result<Query<FeedQuery>, QueryRejection>,
) -> Result<ResponseJson<Vec<NewsItem>>, ApiError> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(state.news().default_page_size());
    let items = state.news().get_featured_news(limit).await?;
    debug!(returned_count = items.len(), "Loaded featured news");
    Ok(ResponseJson(items))
}

#[instrument(skip_all)]
async fn news_tags<S: AppState>(
    State(state): State<S>,
) -> Result<ResponseJson<TagsResponse>, ApiError> {
    let tags = state.news().get_all_tags().await?;
    Ok(ResponseJson(TagsResponse { tags }))
}

/// Drafts are invisible here; they answer 404 like missing ids.
#[instrument(skip_all)]
async fn published_news_by_id<S: AppState>(
    State(state): State<S>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<ResponseJson<NewsItem>, ApiError> {
    let Path(id) = path?;
    match state.news().get_news_by_id(id).await? {
        Some(item) if item.published => Ok(ResponseJson(item)),
        _ => {
            debug!(%id, "Published news item not found");
            Err(ApiError::NotFound)
        }
    }
}

#[instrument(skip_all, fields(user_id = %identity.user_id))]
async fn current_profile<S: AppState>(
    State(state): State<S>,
    AuthenticatedUser(identity): AuthenticatedUser,
) -> Result<ResponseJson<Profile>, ApiError> {
    let profile = state
        .profile_cache()
        .get_or_load(state.profiles(), identity.user_id)
        .await?
        .ok_or(AuthError::ProfileMissing(identity.user_id))?;
    Ok(ResponseJson(profile))
}

#[instrument(skip_all, fields(user_id = %identity.user_id))]
async fn update_profile<S: AppState>(
    State(state): State<S>,
    AuthenticatedUser(identity): AuthenticatedUser,
    payload: Result<Json<ProfileChanges>, JsonRejection>,
) -> Result<ResponseJson<Profile>, ApiError> {
    let Json(changes) = payload?;

    let changes = ProfileChanges {
        full_name: changes.full_name.map(|name| {
            name.map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
        }),
        avatar_url: changes
            .avatar_url
            .map(|url| validate_optional_url("avatar_url", url))
            .transpose()?,
    };

    let profile = state
        .profiles()
        .update(identity.user_id, &changes)
        .await?
        .ok_or(AuthError::ProfileMissing(identity.user_id))?;

    state
        .profile_cache()
        .on_auth_event(AuthEvent::ProfileUpdated(identity.user_id));
    info!("Updated profile");
    Ok(ResponseJson(profile))
}

#[instrument(skip_all, fields(user_id = %identity.user_id))]
async fn sign_out<S: AppState>(
    State(state): State<S>,
    AuthenticatedUser(identity): AuthenticatedUser,
) -> StatusCode {
    state
        .profile_cache()
        .on_auth_event(AuthEvent::SignedOut(identity.user_id));
    StatusCode::NO_CONTENT
}

pub fn create_api_v1_router<S: AppState>(limiter: RateLimiter) -> Router<S> {
    Router::new()
        .route("/news", get(list_published_news::<S>))
        .route("/news/recent", get(recent_news::<S>))
        .route("/news/featured", get(featured_news::<S>))
        .route("/news/tags", get(news_tags::<S>))
        .route("/news/{id}", get(published_news_by_id::<S>))
        .route(
            "/profile",
            get(current_profile::<S>).put(update_profile::<S>),
        )
        .route("/session/signout", post(sign_out::<S>))
        .nest("/admin", admin::create_admin_router(limiter))
}
