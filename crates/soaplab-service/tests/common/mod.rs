#![allow(dead_code)]

use async_trait::async_trait;
use axum_test::TestServer;
use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde_json::{Value, json};
use soaplab_service::auth::{IdentityError, IdentityResolver};
use soaplab_service::db::establish_connection;
use soaplab_service::errors::StoreError;
use soaplab_service::models::{Identity, NewsInsert, NewsRecord, NewsUpdate, ProfileRow};
use soaplab_service::news::NewsService;
use soaplab_service::ratelimit::RateLimiter;
use soaplab_service::repositories::{
    NewsQuery, NewsQueryResult, NewsRepository, SqliteNewsRepository, SqliteProfileRepository,
};
use soaplab_service::schema::profiles;
use soaplab_service::{ServiceState, create_app};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub fn establish_test_connection() -> SqliteConnection {
    establish_connection(":memory:").expect("Failed to create in-memory database")
}

/// Token → user table standing in for the hosted auth service.
#[derive(Clone, Default)]
pub struct StaticIdentity {
    tokens: Arc<Mutex<HashMap<String, Uuid>>>,
    pub calls: Arc<AtomicUsize>,
}

impl StaticIdentity {
    pub fn register(&self, token: &str, user_id: Uuid) {
        self.tokens
            .lock()
            .unwrap()
            .insert(token.to_string(), user_id);
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentity {
    async fn resolve_identity(&self, credential: &str) -> Result<Identity, IdentityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tokens
            .lock()
            .unwrap()
            .get(credential)
            .map(|user_id| Identity {
                user_id: *user_id,
                email: None,
            })
            .ok_or(IdentityError::Rejected)
    }
}

/// SQLite news store that counts every call made against it.
#[derive(Clone)]
pub struct CountingNews {
    inner: SqliteNewsRepository,
    pub calls: Arc<AtomicUsize>,
}

impl CountingNews {
    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl NewsRepository for CountingNews {
    async fn query(&self, query: &NewsQuery) -> Result<NewsQueryResult, StoreError> {
        self.touch();
        self.inner.query(query).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<NewsRecord>, StoreError> {
        self.touch();
        self.inner.find_by_id(id).await
    }

    async fn insert(&self, item: &NewsInsert) -> Result<NewsRecord, StoreError> {
        self.touch();
        self.inner.insert(item).await
    }

    async fn update(
        &self,
        id: Uuid,
        changes: &NewsUpdate,
    ) -> Result<Option<NewsRecord>, StoreError> {
        self.touch();
        self.inner.update(id, changes).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        self.touch();
        self.inner.delete(id).await
    }

    async fn published_tags(&self) -> Result<Vec<String>, StoreError> {
        self.touch();
        self.inner.published_tags().await
    }
}

pub type TestState = ServiceState<CountingNews, SqliteProfileRepository, StaticIdentity>;

pub struct TestApp {
    pub server: TestServer,
    pub db: Arc<Mutex<SqliteConnection>>,
    pub identity: StaticIdentity,
    pub news_calls: Arc<AtomicUsize>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_rate_limit(1_000, Duration::from_secs(60))
    }

    pub fn with_rate_limit(max_requests: u32, window: Duration) -> Self {
        let db = Arc::new(Mutex::new(establish_test_connection()));
        let identity = StaticIdentity::default();
        let news = CountingNews {
            inner: SqliteNewsRepository::new(db.clone()),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let news_calls = news.calls.clone();

        let state: TestState = ServiceState::new(
            NewsService::new(news),
            SqliteProfileRepository::new(db.clone()),
            identity.clone(),
        );
        let app = create_app(state, RateLimiter::new(max_requests, window));

        Self {
            server: TestServer::new(app).unwrap(),
            db,
            identity,
            news_calls,
        }
    }

    /// Registers `token` for a fresh user with a profile carrying `role`.
    pub fn user_with_role(&self, token: &str, role: &str) -> Uuid {
        let user_id = self.signed_in_without_profile(token);
        let now = Utc::now().naive_utc();
        let row = ProfileRow {
            id: user_id.to_string(),
            email: Some(format!("{token}@soaplab.test")),
            full_name: None,
            avatar_url: None,
            role: role.to_string(),
            created_at: now,
            updated_at: now,
        };
        diesel::insert_into(profiles::table)
            .values(&row)
            .execute(&mut *self.db.lock().unwrap())
            .unwrap();
        user_id
    }

    pub fn admin(&self) -> &'static str {
        self.user_with_role("admin-token", "admin");
        "admin-token"
    }

    pub fn member(&self) -> &'static str {
        self.user_with_role("member-token", "member");
        "member-token"
    }

    pub fn signed_in_without_profile(&self, token: &str) -> Uuid {
        let user_id = Uuid::new_v4();
        self.identity.register(token, user_id);
        user_id
    }

    pub fn news_calls(&self) -> usize {
        self.news_calls.load(Ordering::SeqCst)
    }

    /// Creates an item through the admin API and returns its JSON.
    pub async fn create_news(&self, token: &str, body: Value) -> Value {
        let response = self
            .server
            .post("/api/v1/admin/news")
            .authorization_bearer(token)
            .json(&body)
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json::<Value>()
    }
}

pub fn long_content(topic: &str) -> String {
    format!("<p>{topic}: students mixed lye and oils, then cured bars for six weeks.</p>")
}

pub fn draft(title: &str) -> Value {
    json!({
        "title": title,
        "content": long_content(title),
    })
}
