use axum::Router;

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod news;
pub mod ratelimit;
pub mod repositories;
pub mod routes;
pub mod schema;
pub mod validation;

use auth::{IdentityResolver, ProfileCache, SupabaseIdentityResolver};
use news::NewsService;
use ratelimit::RateLimiter;
use repositories::{
    NewsRepository, ProfileRepository, SqliteNewsRepository, SqliteProfileRepository,
};

/// What handlers and extractors need from the application state.
pub trait AppState: Clone + Send + Sync + 'static {
    type News: NewsRepository;
    type Profiles: ProfileRepository;
    type Identity: IdentityResolver;

    fn news(&self) -> &NewsService<Self::News>;
    fn profiles(&self) -> &Self::Profiles;
    fn identity(&self) -> &Self::Identity;
    fn profile_cache(&self) -> &ProfileCache;
}

#[derive(Clone)]
pub struct ServiceState<N, P, I> {
    news: NewsService<N>,
    profiles: P,
    identity: I,
    profile_cache: ProfileCache,
}

impl<N: NewsRepository, P: ProfileRepository, I: IdentityResolver> ServiceState<N, P, I> {
    pub fn new(news: NewsService<N>, profiles: P, identity: I) -> Self {
        Self {
            news,
            profiles,
            identity,
            profile_cache: ProfileCache::new(),
        }
    }
}

impl<N, P, I> AppState for ServiceState<N, P, I>
where
    N: NewsRepository,
    P: ProfileRepository,
    I: IdentityResolver,
{
    type News = N;
    type Profiles = P;
    type Identity = I;

    fn news(&self) -> &NewsService<N> {
        &self.news
    }

    fn profiles(&self) -> &P {
        &self.profiles
    }

    fn identity(&self) -> &I {
        &self.identity
    }

    fn profile_cache(&self) -> &ProfileCache {
        &self.profile_cache
    }
}

pub type DefaultAppState =
    ServiceState<SqliteNewsRepository, SqliteProfileRepository, SupabaseIdentityResolver>;

pub fn create_app<S: AppState>(state: S, limiter: RateLimiter) -> Router {
    routes::create_router(limiter).with_state(state)
}
