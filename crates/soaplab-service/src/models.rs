use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewsCategory {
    #[default]
    General,
    Events,
    Achievements,
    Announcements,
    Workshops,
    Partnerships,
}

impl NewsCategory {
    pub const ALL: [NewsCategory; 6] = [
        NewsCategory::General,
        NewsCategory::Events,
        NewsCategory::Achievements,
        NewsCategory::Announcements,
        NewsCategory::Workshops,
        NewsCategory::Partnerships,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NewsCategory::General => "general",
            NewsCategory::Events => "events",
            NewsCategory::Achievements => "achievements",
            NewsCategory::Announcements => "announcements",
            NewsCategory::Workshops => "workshops",
            NewsCategory::Partnerships => "partnerships",
        }
    }
}

impl fmt::Display for NewsCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory;

impl FromStr for NewsCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NewsCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or(UnknownCategory)
    }
}

/// A news row as the content store hands it back. Columns that older rows
/// may lack are optional here and only defaulted by normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsRecord {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub featured: Option<bool>,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    pub content_images: Vec<String>,
    pub content_videos: Vec<String>,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsItem {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub category: NewsCategory,
    pub tags: Vec<String>,
    pub featured: bool,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    pub content_images: Vec<String>,
    pub content_videos: Vec<String>,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewsRecord {
    /// Read-side shape: every optional column gets its default, and a missing
    /// `published_at` falls back to `created_at`.
    pub fn normalize(self) -> NewsItem {
        let published_at = self.published_at.unwrap_or(self.created_at);
        let mut item = self.into_item();
        item.published_at = Some(published_at);
        item
    }

    /// Write-side shape: defaults applied, `published_at` exactly as stored.
    pub fn into_item(self) -> NewsItem {
        let category = self
            .category
            .as_deref()
            .and_then(|category| category.parse().ok())
            .unwrap_or_default();

        NewsItem {
            id: self.id,
            title: self.title,
            content: self.content,
            excerpt: self.excerpt,
            category,
            tags: self.tags.unwrap_or_default(),
            featured: self.featured.unwrap_or(false),
            published: self.published,
            published_at: self.published_at,
            image_url: self.image_url,
            content_images: self.content_images,
            content_videos: self.content_videos,
            author_id: self.author_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewsFilters {
    pub published: Option<bool>,
    pub category: Option<NewsCategory>,
    pub featured: Option<bool>,
    /// Matches items carrying at least one of these tags.
    pub tags: Option<Vec<String>>,
    pub search: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let total_pages = total.div_ceil(u64::from(limit.max(1)));
        Self {
            page,
            limit,
            total,
            total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

/// Editor input for a new item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsDraft {
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub featured: Option<bool>,
    pub published: Option<bool>,
    pub image_url: Option<String>,
    pub content_images: Option<Vec<String>>,
    pub content_videos: Option<Vec<String>>,
}

/// Editor input for a partial update. For `excerpt` and `image_url` an
/// explicit `null` clears the column while an absent key leaves it alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub excerpt: Option<Option<String>>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub featured: Option<bool>,
    pub published: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    pub image_url: Option<Option<String>>,
    pub content_images: Option<Vec<String>>,
    pub content_videos: Option<Vec<String>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Validated values the mutation layer hands to the store for an insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsInsert {
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub category: NewsCategory,
    pub tags: Vec<String>,
    pub featured: bool,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    pub content_images: Vec<String>,
    pub content_videos: Vec<String>,
    pub author_id: Uuid,
}

/// Validated column changes for an update; `None` leaves a column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewsUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<Option<String>>,
    pub category: Option<NewsCategory>,
    pub tags: Option<Vec<String>>,
    pub featured: Option<bool>,
    pub published: Option<bool>,
    pub published_at: Option<DateTime<Utc>>,
    pub image_url: Option<Option<String>>,
    pub content_images: Option<Vec<String>>,
    pub content_videos: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub const ADMIN_ROLE: &'static str = "admin";

    pub fn is_admin(&self) -> bool {
        self.role == Self::ADMIN_ROLE
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileChanges {
    #[serde(default, deserialize_with = "present")]
    pub full_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub avatar_url: Option<Option<String>>,
}

/// The authenticated principal behind a bearer credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: Option<String>,
}

// Diesel row types. Field order follows `schema.rs`.

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::news)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NewsRow {
    pub id: String,
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub category: Option<String>,
    pub featured: Option<bool>,
    pub published: bool,
    pub published_at: Option<NaiveDateTime>,
    pub image_url: Option<String>,
    pub content_images: String,
    pub content_videos: String,
    pub author_id: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::news)]
pub struct NewNewsRow {
    pub id: String,
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub category: Option<String>,
    pub featured: Option<bool>,
    pub published: bool,
    pub published_at: Option<NaiveDateTime>,
    pub image_url: Option<String>,
    pub content_images: String,
    pub content_videos: String,
    pub author_id: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = crate::schema::news)]
pub struct NewsChangeset {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<Option<String>>,
    pub category: Option<Option<String>>,
    pub featured: Option<Option<bool>>,
    pub published: Option<bool>,
    pub published_at: Option<Option<NaiveDateTime>>,
    pub image_url: Option<Option<String>>,
    pub content_images: Option<String>,
    pub content_videos: Option<String>,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::news_tags)]
pub struct NewsTagRow {
    pub news_id: String,
    pub position: i32,
    pub tag: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::profiles)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ProfileRow {
    pub id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = crate::schema::profiles)]
pub struct ProfileChangeset {
    pub full_name: Option<Option<String>>,
    pub avatar_url: Option<Option<String>>,
    pub updated_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bare_record() -> NewsRecord {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        NewsRecord {
            id: Uuid::new_v4(),
            title: "Soap drive".to_string(),
            content: "Body".to_string(),
            excerpt: None,
            category: None,
            tags: None,
            featured: None,
            published: false,
            published_at: None,
            image_url: None,
            content_images: Vec::new(),
            content_videos: Vec::new(),
            author_id: Uuid::new_v4(),
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_normalize_fills_every_default() {
        let record = bare_record();
        let created = record.created_at;
        let item = record.normalize();

        assert_eq!(item.excerpt, None);
        assert_eq!(item.category, NewsCategory::General);
        assert!(item.tags.is_empty());
        assert!(!item.featured);
        assert_eq!(item.image_url, None);
        assert_eq!(item.published_at, Some(created));
    }

    #[test]
    fn test_into_item_keeps_stored_published_at() {
        let item = bare_record().into_item();
        assert_eq!(item.published_at, None);
        assert_eq!(item.category, NewsCategory::General);
    }

    #[test]
    fn test_normalize_keeps_present_values() {
        let published = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();
        let record = NewsRecord {
            category: Some("workshops".to_string()),
            tags: Some(vec!["lye".to_string(), "safety".to_string()]),
            featured: Some(true),
            published: true,
            published_at: Some(published),
            ..bare_record()
        };
        let item = record.normalize();

        assert_eq!(item.category, NewsCategory::Workshops);
        assert_eq!(item.tags, vec!["lye", "safety"]);
        assert!(item.featured);
        assert_eq!(item.published_at, Some(published));
    }

    #[test]
    fn test_unrecognized_stored_category_falls_back_to_general() {
        let record = NewsRecord {
            category: Some("legacy".to_string()),
            ..bare_record()
        };
        assert_eq!(record.normalize().category, NewsCategory::General);
    }

    #[test]
    fn test_category_round_trips_through_str() {
        for category in NewsCategory::ALL {
            assert_eq!(category.as_str().parse::<NewsCategory>(), Ok(category));
        }
        assert_eq!("General".parse::<NewsCategory>(), Err(UnknownCategory));
    }

    #[test]
    fn test_pagination_total_pages() {
        assert_eq!(Pagination::new(1, 10, 0).total_pages, 0);
        assert_eq!(Pagination::new(1, 10, 10).total_pages, 1);
        assert_eq!(Pagination::new(2, 10, 11).total_pages, 2);
        assert_eq!(Pagination::new(1, 3, 7).total_pages, 3);
    }

    #[test]
    fn test_patch_distinguishes_null_from_absent() {
        let patch: NewsPatch = serde_json::from_str(r#"{"excerpt": null}"#).unwrap();
        assert_eq!(patch.excerpt, Some(None));
        assert_eq!(patch.image_url, None);

        let patch: NewsPatch = serde_json::from_str(r#"{"image_url": "https://x.org/a.png"}"#).unwrap();
        assert_eq!(patch.image_url, Some(Some("https://x.org/a.png".to_string())));
    }

    #[test]
    fn test_admin_role_check() {
        let now = Utc::now();
        let mut profile = Profile {
            id: Uuid::new_v4(),
            email: None,
            full_name: None,
            avatar_url: None,
            role: "member".to_string(),
            created_at: now,
            updated_at: now,
        };
        assert!(!profile.is_admin());
        profile.role = "admin".to_string();
        assert!(profile.is_admin());
    }
}
