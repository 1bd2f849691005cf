use std::collections::BTreeSet;

use tracing::{debug, instrument};
use uuid::Uuid;

use super::NewsService;
use crate::errors::NewsError;
use crate::models::{NewsFilters, NewsItem, Page, Pagination};
use crate::repositories::{NewsOrder, NewsQuery, NewsRepository};
use crate::validation::ValidationError;

impl<R: NewsRepository> NewsService<R> {
    /// One page of items matching `filters`, featured first.
    ///
    /// `page` is 1-based; `limit` defaults to the configured page size and is
    /// capped at the maximum page size.
    #[instrument(skip_all, fields(page = ?page, limit = ?limit))]
    pub async fn list_news(
        &self,
        filters: NewsFilters,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Page<NewsItem>, NewsError> {
        let page = page.unwrap_or(1);
        if page == 0 {
            return Err(ValidationError::InvalidPage.into());
        }
        let limit = match limit {
            Some(0) => return Err(ValidationError::InvalidLimit.into()),
            Some(limit) => limit.min(self.max_page_size),
            None => self.default_page_size,
        };

        let query = NewsQuery {
            filters,
            offset: (i64::from(page) - 1) * i64::from(limit),
            limit: i64::from(limit),
            order: NewsOrder::Listing,
        };
        let result = self.repo.query(&query).await?;

        debug!(
            returned = result.records.len(),
            total = result.total,
            "Listed news"
        );

        Ok(Page {
            data: result.records.into_iter().map(|r| r.normalize()).collect(),
            pagination: Pagination::new(page, limit, result.total),
        })
    }

    /// `None` when no row has this id.
    #[instrument(skip(self))]
    pub async fn get_news_by_id(&self, id: Uuid) -> Result<Option<NewsItem>, NewsError> {
        let record = self.repo.find_by_id(id).await?;
        Ok(record.map(|r| r.normalize()))
    }

    #[instrument(skip(self))]
    pub async fn get_recent_news(&self, limit: u32) -> Result<Vec<NewsItem>, NewsError> {
        let filters = NewsFilters {
            published: Some(true),
            ..Default::default()
        };
        self.feed(filters, limit).await
    }

    #[instrument(skip(self))]
    pub async fn get_featured_news(&self, limit: u32) -> Result<Vec<NewsItem>, NewsError> {
        let filters = NewsFilters {
            published: Some(true),
            featured: Some(true),
            ..Default::default()
        };
        self.feed(filters, limit).await
    }

    /// Distinct tags across published items, sorted.
    #[instrument(skip(self))]
    pub async fn get_all_tags(&self) -> Result<Vec<String>, NewsError> {
        let tags: BTreeSet<String> = self.repo.published_tags().await?.into_iter().collect();
        Ok(tags.into_iter().collect())
    }

    async fn feed(&self, filters: NewsFilters, limit: u32) -> Result<Vec<NewsItem>, NewsError> {
        if limit == 0 {
            return Err(ValidationError::InvalidLimit.into());
        }

        let query = NewsQuery {
            filters,
            offset: 0,
            limit: i64::from(limit.min(self.max_page_size)),
            order: NewsOrder::Recency,
        };
        let result = self.repo.query(&query).await?;
        Ok(result.records.into_iter().map(|r| r.normalize()).collect())
    }
}
