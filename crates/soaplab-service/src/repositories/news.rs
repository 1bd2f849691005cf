use super::traits::{NewsOrder, NewsQuery, NewsQueryResult, NewsRepository};
use crate::errors::StoreError;
use crate::models::{
    NewNewsRow, NewsChangeset, NewsFilters, NewsInsert, NewsRecord, NewsRow, NewsTagRow,
    NewsUpdate,
};
use crate::schema::{news, news_tags};
use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::sql_types::{Bool, Nullable, Text, Timestamp};
use diesel::sqlite::{Sqlite, SqliteConnection};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

diesel::define_sql_function! {
    #[sql_name = "COALESCE"]
    fn coalesce_timestamp(x: Nullable<Timestamp>, y: Timestamp) -> Timestamp;
}

diesel::define_sql_function! {
    #[sql_name = "COALESCE"]
    fn coalesce_text(x: Nullable<Text>, y: Text) -> Text;
}

diesel::define_sql_function! {
    #[sql_name = "COALESCE"]
    fn coalesce_bool(x: Nullable<Bool>, y: Bool) -> Bool;
}

#[derive(Clone)]
pub struct SqliteNewsRepository {
    db: Arc<Mutex<SqliteConnection>>,
}

impl SqliteNewsRepository {
    pub fn new(db: Arc<Mutex<SqliteConnection>>) -> Self {
        Self { db }
    }

    fn conn(&self) -> Result<MutexGuard<'_, SqliteConnection>, StoreError> {
        self.db.lock().map_err(|_| StoreError::ConnectionPoisoned)
    }

    /// Rows matching every filter. Missing `category` and `featured` values
    /// compare as their defaults so filtering agrees with normalization.
    fn filtered(filters: &NewsFilters) -> news::BoxedQuery<'static, Sqlite> {
        let mut query = news::table.into_boxed();

        if let Some(published) = filters.published {
            query = query.filter(news::published.eq(published));
        }

        if let Some(category) = filters.category {
            query = query.filter(coalesce_text(news::category, "general").eq(category.as_str()));
        }

        if let Some(featured) = filters.featured {
            query = query.filter(coalesce_bool(news::featured, false).eq(featured));
        }

        if let Some(tags) = filters.tags.as_ref().filter(|tags| !tags.is_empty()) {
            let tagged = news_tags::table
                .filter(news_tags::tag.eq_any(tags.clone()))
                .select(news_tags::news_id);
            query = query.filter(news::id.eq_any(tagged));
        }

        if let Some(term) = filters.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = format!("%{}%", escape_like(term));
            query = query.filter(
                news::title
                    .like(pattern.clone())
                    .escape('\\')
                    .or(news::content.like(pattern.clone()).escape('\\'))
                    .or(coalesce_text(news::excerpt, "").like(pattern).escape('\\')),
            );
        }

        if let Some(from) = filters.date_from {
            query = query.filter(
                coalesce_timestamp(news::published_at, news::created_at).ge(from.naive_utc()),
            );
        }

        if let Some(to) = filters.date_to {
            query = query.filter(
                coalesce_timestamp(news::published_at, news::created_at).le(to.naive_utc()),
            );
        }

        query
    }

    fn load_tags(
        conn: &mut SqliteConnection,
        ids: &[String],
    ) -> Result<HashMap<String, Vec<String>>, StoreError> {
        let rows = news_tags::table
            .filter(news_tags::news_id.eq_any(ids))
            .order((news_tags::news_id.asc(), news_tags::position.asc()))
            .select((news_tags::news_id, news_tags::tag))
            .load::<(String, String)>(conn)?;

        let mut tags: HashMap<String, Vec<String>> = HashMap::new();
        for (news_id, tag) in rows {
            tags.entry(news_id).or_default().push(tag);
        }
        Ok(tags)
    }

    fn replace_tags(
        conn: &mut SqliteConnection,
        news_id: &str,
        tags: &[String],
    ) -> Result<(), StoreError> {
        diesel::delete(news_tags::table.filter(news_tags::news_id.eq(news_id))).execute(conn)?;

        if tags.is_empty() {
            return Ok(());
        }

        let rows: Vec<NewsTagRow> = tags
            .iter()
            .enumerate()
            .map(|(position, tag)| NewsTagRow {
                news_id: news_id.to_string(),
                position: position as i32,
                tag: tag.clone(),
            })
            .collect();

        diesel::insert_into(news_tags::table)
            .values(&rows)
            .execute(conn)?;
        Ok(())
    }

    fn attach_tags(
        conn: &mut SqliteConnection,
        rows: Vec<NewsRow>,
    ) -> Result<Vec<NewsRecord>, StoreError> {
        let ids: Vec<String> = rows.iter().map(|row| row.id.clone()).collect();
        let mut tags = Self::load_tags(conn, &ids)?;

        rows.into_iter()
            .map(|row| {
                let row_tags = tags.remove(&row.id).unwrap_or_default();
                to_record(row, row_tags)
            })
            .collect()
    }
}

#[async_trait]
impl NewsRepository for SqliteNewsRepository {
    async fn query(&self, query: &NewsQuery) -> Result<NewsQueryResult, StoreError> {
        let mut conn = self.conn()?;

        let total = Self::filtered(&query.filters)
            .count()
            .get_result::<i64>(&mut *conn)?;

        let statement = Self::filtered(&query.filters);
        let statement = match query.order {
            NewsOrder::Listing => statement.order((
                coalesce_bool(news::featured, false).desc(),
                coalesce_timestamp(news::published_at, news::created_at).desc(),
                news::created_at.desc(),
            )),
            NewsOrder::Recency => {
                statement.order(coalesce_timestamp(news::published_at, news::created_at).desc())
            }
        };

        let rows = statement
            .limit(query.limit)
            .offset(query.offset)
            .load::<NewsRow>(&mut *conn)?;

        let records = Self::attach_tags(&mut conn, rows)?;

        Ok(NewsQueryResult {
            records,
            total: total.max(0) as u64,
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<NewsRecord>, StoreError> {
        let mut conn = self.conn()?;
        let row = news::table
            .find(id.to_string())
            .first::<NewsRow>(&mut *conn)
            .optional()?;

        match row {
            Some(row) => Ok(Self::attach_tags(&mut conn, vec![row])?.pop()),
            None => Ok(None),
        }
    }

    async fn insert(&self, item: &NewsInsert) -> Result<NewsRecord, StoreError> {
        let mut conn = self.conn()?;
        let now = Utc::now().naive_utc();

        let row = NewNewsRow {
            id: Uuid::new_v4().to_string(),
            title: item.title.clone(),
            content: item.content.clone(),
            excerpt: item.excerpt.clone(),
            category: Some(item.category.as_str().to_string()),
            featured: Some(item.featured),
            published: item.published,
            published_at: item.published_at.map(|at| at.naive_utc()),
            image_url: item.image_url.clone(),
            content_images: encode_list(&item.content_images)?,
            content_videos: encode_list(&item.content_videos)?,
            author_id: item.author_id.to_string(),
            created_at: now,
            updated_at: now,
        };

        let inserted = conn.transaction::<_, StoreError, _>(|conn| {
            let inserted = diesel::insert_into(news::table)
                .values(&row)
                .returning(news::all_columns)
                .get_result::<NewsRow>(conn)?;
            Self::replace_tags(conn, &inserted.id, &item.tags)?;
            Ok(inserted)
        })?;

        to_record(inserted, item.tags.clone())
    }

    async fn update(
        &self,
        id: Uuid,
        changes: &NewsUpdate,
    ) -> Result<Option<NewsRecord>, StoreError> {
        let mut conn = self.conn()?;

        let changeset = NewsChangeset {
            title: changes.title.clone(),
            content: changes.content.clone(),
            excerpt: changes.excerpt.clone(),
            category: changes
                .category
                .map(|category| Some(category.as_str().to_string())),
            featured: changes.featured.map(Some),
            published: changes.published,
            published_at: changes.published_at.map(|at| Some(at.naive_utc())),
            image_url: changes.image_url.clone(),
            content_images: changes
                .content_images
                .as_deref()
                .map(encode_list)
                .transpose()?,
            content_videos: changes
                .content_videos
                .as_deref()
                .map(encode_list)
                .transpose()?,
            updated_at: Utc::now().naive_utc(),
        };

        let updated = conn.transaction::<_, StoreError, _>(|conn| {
            let updated = diesel::update(news::table.find(id.to_string()))
                .set(&changeset)
                .returning(news::all_columns)
                .get_result::<NewsRow>(conn)
                .optional()?;

            if let (Some(row), Some(tags)) = (&updated, &changes.tags) {
                Self::replace_tags(conn, &row.id, tags)?;
            }
            Ok(updated)
        })?;

        match updated {
            Some(row) => Ok(Self::attach_tags(&mut conn, vec![row])?.pop()),
            None => Ok(None),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut conn = self.conn()?;
        let id = id.to_string();

        let deleted = conn.transaction::<_, StoreError, _>(|conn| {
            diesel::delete(news_tags::table.filter(news_tags::news_id.eq(&id))).execute(conn)?;
            let deleted = diesel::delete(news::table.find(&id)).execute(conn)?;
            Ok(deleted)
        })?;

        Ok(deleted > 0)
    }

    async fn published_tags(&self) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn()?;
        let tags = news_tags::table
            .inner_join(news::table)
            .filter(news::published.eq(true))
            .select(news_tags::tag)
            .load::<String>(&mut *conn)?;
        Ok(tags)
    }
}

fn to_record(row: NewsRow, tags: Vec<String>) -> Result<NewsRecord, StoreError> {
    Ok(NewsRecord {
        id: parse_uuid(&row.id)?,
        title: row.title,
        content: row.content,
        excerpt: row.excerpt,
        category: row.category,
        tags: Some(tags),
        featured: row.featured,
        published: row.published,
        published_at: row.published_at.map(|at| at.and_utc()),
        image_url: row.image_url,
        content_images: decode_list(&row.content_images)?,
        content_videos: decode_list(&row.content_videos)?,
        author_id: parse_uuid(&row.author_id)?,
        created_at: row.created_at.and_utc(),
        updated_at: row.updated_at.and_utc(),
    })
}

fn parse_uuid(raw: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw).map_err(|err| StoreError::CorruptRow(format!("bad id {raw:?}: {err}")))
}

fn encode_list(values: &[String]) -> Result<String, StoreError> {
    serde_json::to_string(values).map_err(|err| StoreError::CorruptRow(err.to_string()))
}

fn decode_list(raw: &str) -> Result<Vec<String>, StoreError> {
    serde_json::from_str(raw).map_err(|err| StoreError::CorruptRow(err.to_string()))
}

/// Escapes LIKE wildcards so search terms match literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
