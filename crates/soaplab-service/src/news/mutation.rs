use chrono::Utc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::NewsService;
use crate::errors::NewsError;
use crate::models::{NewsDraft, NewsInsert, NewsItem, NewsPatch, NewsUpdate};
use crate::repositories::NewsRepository;
use crate::validation::{
    ValidationError, normalize_tags, validate_category, validate_content, validate_excerpt,
    validate_optional_url, validate_title, validate_url_list,
};

impl<R: NewsRepository> NewsService<R> {
    /// Validates `draft` and stores it under `author_id`. Nothing is written
    /// when validation fails.
    #[instrument(skip_all, fields(author_id = %author_id, published = ?draft.published))]
    pub async fn create_news(
        &self,
        draft: NewsDraft,
        author_id: Uuid,
    ) -> Result<NewsItem, NewsError> {
        let insert = prepare_insert(draft, author_id)?;
        debug!(tags = insert.tags.len(), "Draft validated");

        let record = self.repo.insert(&insert).await?;
        info!(id = %record.id, published = record.published, "Created news item");

        Ok(record.into_item())
    }

    /// Applies the fields present in `patch`. Publishing an item that has
    /// never been published stamps `published_at`; an existing stamp is kept.
    #[instrument(skip_all, fields(id = %id))]
    pub async fn update_news(&self, id: Uuid, patch: NewsPatch) -> Result<NewsItem, NewsError> {
        let mut update = prepare_update(patch)?;

        let existing = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or(NewsError::NotFound(id))?;

        if update.published == Some(true) && existing.published_at.is_none() {
            debug!("First publish, stamping published_at");
            update.published_at = Some(Utc::now());
        }

        let record = self
            .repo
            .update(id, &update)
            .await?
            .ok_or(NewsError::NotFound(id))?;
        info!(published = record.published, "Updated news item");

        Ok(record.into_item())
    }

    /// Hard delete. `false` when there was nothing to delete.
    #[instrument(skip(self))]
    pub async fn delete_news(&self, id: Uuid) -> Result<bool, NewsError> {
        let deleted = self.repo.delete(id).await?;
        if deleted {
            info!("Deleted news item");
        } else {
            debug!("No news item to delete");
        }
        Ok(deleted)
    }
}

fn prepare_insert(draft: NewsDraft, author_id: Uuid) -> Result<NewsInsert, ValidationError> {
    if author_id.is_nil() {
        return Err(ValidationError::MissingAuthor);
    }

    let title = validate_title(&draft.title)?;
    validate_content(&draft.content)?;
    let category = match draft.category.as_deref() {
        Some(category) => validate_category(category)?,
        None => Default::default(),
    };
    let published = draft.published.unwrap_or(false);

    Ok(NewsInsert {
        title,
        content: draft.content,
        excerpt: validate_excerpt(draft.excerpt)?,
        category,
        tags: normalize_tags(draft.tags.unwrap_or_default())?,
        featured: draft.featured.unwrap_or(false),
        published,
        published_at: published.then(Utc::now),
        image_url: validate_optional_url("image_url", draft.image_url)?,
        content_images: validate_url_list(
            "content_images",
            draft.content_images.unwrap_or_default(),
        )?,
        content_videos: validate_url_list(
            "content_videos",
            draft.content_videos.unwrap_or_default(),
        )?,
        author_id,
    })
}

fn prepare_update(patch: NewsPatch) -> Result<NewsUpdate, ValidationError> {
    if let Some(content) = &patch.content {
        validate_content(content)?;
    }

    Ok(NewsUpdate {
        title: patch.title.as_deref().map(validate_title).transpose()?,
        content: patch.content,
        excerpt: patch.excerpt.map(validate_excerpt).transpose()?,
        category: patch
            .category
            .as_deref()
            .map(validate_category)
            .transpose()?,
        tags: patch.tags.map(normalize_tags).transpose()?,
        featured: patch.featured,
        published: patch.published,
        published_at: None,
        image_url: patch
            .image_url
            .map(|url| validate_optional_url("image_url", url))
            .transpose()?,
        content_images: patch
            .content_images
            .map(|urls| validate_url_list("content_images", urls))
            .transpose()?,
        content_videos: patch
            .content_videos
            .map(|urls| validate_url_list("content_videos", urls))
            .transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::establish_test_connection;
    use crate::errors::StoreError;
    use crate::models::{NewsCategory, NewsFilters, NewsRecord};
    use crate::repositories::{NewsQuery, NewsQueryResult, SqliteNewsRepository};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn service() -> NewsService<SqliteNewsRepository> {
        let db = Arc::new(Mutex::new(establish_test_connection()));
        NewsService::new(SqliteNewsRepository::new(db))
    }

    fn draft() -> NewsDraft {
        NewsDraft {
            title: "Test".to_string(),
            content: "x".repeat(60),
            published: Some(false),
            ..Default::default()
        }
    }

    /// Repository that counts calls and stores nothing.
    #[derive(Clone, Default)]
    struct CountingRepository {
        calls: Arc<AtomicUsize>,
    }

    impl CountingRepository {
        fn touched(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn hit(&self) -> StoreError {
            self.calls.fetch_add(1, Ordering::SeqCst);
            StoreError::ConnectionPoisoned
        }
    }

    #[async_trait]
    impl NewsRepository for CountingRepository {
        async fn query(&self, _query: &NewsQuery) -> Result<NewsQueryResult, StoreError> {
            Err(self.hit())
        }
        async fn find_by_id(&self, _id: Uuid) -> Result<Option<NewsRecord>, StoreError> {
            Err(self.hit())
        }
        async fn insert(&self, _item: &NewsInsert) -> Result<NewsRecord, StoreError> {
            Err(self.hit())
        }
        async fn update(
            &self,
            _id: Uuid,
            _changes: &NewsUpdate,
        ) -> Result<Option<NewsRecord>, StoreError> {
            Err(self.hit())
        }
        async fn delete(&self, _id: Uuid) -> Result<bool, StoreError> {
            Err(self.hit())
        }
        async fn published_tags(&self) -> Result<Vec<String>, StoreError> {
            Err(self.hit())
        }
    }

    #[tokio::test]
    async fn test_create_draft_then_publish_scenario() {
        let svc = service();
        let author = Uuid::new_v4();

        let created = svc.create_news(draft(), author).await.unwrap();
        assert_eq!(created.published_at, None);
        assert_eq!(created.category, NewsCategory::General);
        assert!(created.tags.is_empty());
        assert!(!created.published);
        assert_eq!(created.author_id, author);
        assert!(created.content_images.is_empty());
        assert!(created.content_videos.is_empty());

        let patch = NewsPatch {
            published: Some(true),
            ..Default::default()
        };
        let published = svc.update_news(created.id, patch).await.unwrap();
        assert!(published.published);
        assert!(published.published_at.is_some());

        let visible = svc
            .list_news(
                NewsFilters {
                    published: Some(true),
                    ..Default::default()
                },
                None,
                None,
            )
            .await
            .unwrap();
        assert!(visible.data.iter().any(|item| item.id == created.id));

        let drafts = svc
            .list_news(
                NewsFilters {
                    published: Some(false),
                    ..Default::default()
                },
                None,
                None,
            )
            .await
            .unwrap();
        assert!(drafts.data.iter().all(|item| item.id != created.id));
    }

    #[tokio::test]
    async fn test_create_published_stamps_published_at() {
        let svc = service();
        let item = svc
            .create_news(
                NewsDraft {
                    published: Some(true),
                    ..draft()
                },
                Uuid::new_v4(),
            )
            .await
            .unwrap();
        assert!(item.published_at.is_some());
    }

    #[tokio::test]
    async fn test_editing_published_item_keeps_published_at() {
        let svc = service();
        let item = svc
            .create_news(
                NewsDraft {
                    published: Some(true),
                    ..draft()
                },
                Uuid::new_v4(),
            )
            .await
            .unwrap();

        let patch = NewsPatch {
            title: Some("Retitled".to_string()),
            ..Default::default()
        };
        let edited = svc.update_news(item.id, patch).await.unwrap();
        assert_eq!(edited.title, "Retitled");
        assert_eq!(edited.published_at, item.published_at);
    }

    #[tokio::test]
    async fn test_republish_keeps_original_published_at() {
        let svc = service();
        let item = svc
            .create_news(
                NewsDraft {
                    published: Some(true),
                    ..draft()
                },
                Uuid::new_v4(),
            )
            .await
            .unwrap();

        let unpublish = NewsPatch {
            published: Some(false),
            ..Default::default()
        };
        let hidden = svc.update_news(item.id, unpublish).await.unwrap();
        assert!(!hidden.published);

        let republish = NewsPatch {
            published: Some(true),
            ..Default::default()
        };
        let again = svc.update_news(item.id, republish).await.unwrap();
        assert_eq!(again.published_at, item.published_at);
    }

    #[tokio::test]
    async fn test_update_missing_item_is_not_found() {
        let svc = service();
        let id = Uuid::new_v4();
        let patch = NewsPatch {
            title: Some("Nobody home".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            svc.update_news(id, patch).await,
            Err(NewsError::NotFound(missing)) if missing == id
        ));
    }

    #[tokio::test]
    async fn test_update_clears_excerpt_with_explicit_null() {
        let svc = service();
        let item = svc
            .create_news(
                NewsDraft {
                    excerpt: Some("Short".to_string()),
                    ..draft()
                },
                Uuid::new_v4(),
            )
            .await
            .unwrap();
        assert_eq!(item.excerpt.as_deref(), Some("Short"));

        let patch: NewsPatch = serde_json::from_str(r#"{"excerpt": null}"#).unwrap();
        let cleared = svc.update_news(item.id, patch).await.unwrap();
        assert_eq!(cleared.excerpt, None);
    }

    #[tokio::test]
    async fn test_delete_reports_missing_as_false() {
        let svc = service();
        let item = svc.create_news(draft(), Uuid::new_v4()).await.unwrap();
        assert!(svc.delete_news(item.id).await.unwrap());
        assert!(!svc.delete_news(item.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_category_never_reaches_store() {
        let repo = CountingRepository::default();
        let svc = NewsService::new(repo.clone());

        let result = svc
            .create_news(
                NewsDraft {
                    category: Some("not-a-real-category".to_string()),
                    ..draft()
                },
                Uuid::new_v4(),
            )
            .await;

        assert!(matches!(
            result,
            Err(NewsError::Validation(ValidationError::UnknownCategory(_)))
        ));
        assert_eq!(repo.touched(), 0);
    }

    #[tokio::test]
    async fn test_invalid_patch_never_reaches_store() {
        let repo = CountingRepository::default();
        let svc = NewsService::new(repo.clone());

        let patch = NewsPatch {
            content: Some("too short".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            svc.update_news(Uuid::new_v4(), patch).await,
            Err(NewsError::Validation(ValidationError::ContentTooShort))
        ));
        assert_eq!(repo.touched(), 0);
    }

    #[tokio::test]
    async fn test_nil_author_rejected() {
        let repo = CountingRepository::default();
        let svc = NewsService::new(repo.clone());
        assert!(matches!(
            svc.create_news(draft(), Uuid::nil()).await,
            Err(NewsError::Validation(ValidationError::MissingAuthor))
        ));
        assert_eq!(repo.touched(), 0);
    }

    #[tokio::test]
    async fn test_store_failures_propagate_on_write() {
        let repo = CountingRepository::default();
        let svc = NewsService::new(repo.clone());
        assert!(matches!(
            svc.create_news(draft(), Uuid::new_v4()).await,
            Err(NewsError::Store(StoreError::ConnectionPoisoned))
        ));
        assert!(matches!(
            svc.delete_news(Uuid::new_v4()).await,
            Err(NewsError::Store(_))
        ));
        assert_eq!(repo.touched(), 2);
    }
}
