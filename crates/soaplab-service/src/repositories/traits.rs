use crate::errors::StoreError;
use crate::models::{NewsFilters, NewsInsert, NewsRecord, NewsUpdate, Profile, ProfileChanges};
use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewsOrder {
    /// Featured first, then newest publish time, then newest creation time.
    Listing,
    /// Newest publish time only.
    Recency,
}

#[derive(Debug, Clone)]
pub struct NewsQuery {
    pub filters: NewsFilters,
    pub offset: i64,
    pub limit: i64,
    pub order: NewsOrder,
}

#[derive(Debug, Clone)]
pub struct NewsQueryResult {
    pub records: Vec<NewsRecord>,
    /// Exact number of rows matching the filters, ignoring offset and limit.
    pub total: u64,
}

#[async_trait]
pub trait NewsRepository: Clone + Send + Sync + 'static {
    async fn query(&self, query: &NewsQuery) -> Result<NewsQueryResult, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<NewsRecord>, StoreError>;
    async fn insert(&self, item: &NewsInsert) -> Result<NewsRecord, StoreError>;
    async fn update(&self, id: Uuid, changes: &NewsUpdate)
    -> Result<Option<NewsRecord>, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
    /// Tags of every published item, duplicates included.
    async fn published_tags(&self) -> Result<Vec<String>, StoreError>;
}

#[async_trait]
pub trait ProfileRepository: Clone + Send + Sync + 'static {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError>;
    async fn update(
        &self,
        user_id: Uuid,
        changes: &ProfileChanges,
    ) -> Result<Option<Profile>, StoreError>;
}
