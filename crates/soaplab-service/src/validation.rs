use thiserror::Error;
use url::Url;

use crate::models::NewsCategory;

pub const MAX_TITLE_LENGTH: usize = 200;
pub const MIN_CONTENT_LENGTH: usize = 50;
pub const MAX_EXCERPT_LENGTH: usize = 500;
pub const MAX_TAGS: usize = 20;
pub const MAX_TAG_LENGTH: usize = 50;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Title cannot be empty")]
    EmptyTitle,
    #[error("Title must be at most 200 characters")]
    TitleTooLong,
    #[error("Content must contain at least 50 characters of text")]
    ContentTooShort,
    #[error("Excerpt must be at most 500 characters")]
    ExcerptTooLong,
    #[error("Unknown category: {0}")]
    UnknownCategory(String),
    #[error("At most 20 tags are allowed")]
    TooManyTags,
    #[error("Tag must be at most 50 characters: {0}")]
    TagTooLong(String),
    #[error("Malformed URL in {field}: {reason}")]
    MalformedUrl { field: &'static str, reason: String },
    #[error("Unsupported URL scheme in {field}: {scheme}")]
    UnsupportedScheme { field: &'static str, scheme: String },
    #[error("An author is required to create news")]
    MissingAuthor,
    #[error("Page must be at least 1")]
    InvalidPage,
    #[error("Limit must be greater than 0")]
    InvalidLimit,
}

pub fn validate_title(title: &str) -> Result<String, ValidationError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ValidationError::TitleTooLong);
    }
    Ok(title.to_string())
}

/// Content is stored as submitted; only its visible text is measured.
pub fn validate_content(content: &str) -> Result<(), ValidationError> {
    if effective_length(content) < MIN_CONTENT_LENGTH {
        return Err(ValidationError::ContentTooShort);
    }
    Ok(())
}

/// Blank excerpts collapse to `None`.
pub fn validate_excerpt(excerpt: Option<String>) -> Result<Option<String>, ValidationError> {
    let Some(excerpt) = excerpt else {
        return Ok(None);
    };
    let excerpt = excerpt.trim();
    if excerpt.is_empty() {
        return Ok(None);
    }
    if excerpt.chars().count() > MAX_EXCERPT_LENGTH {
        return Err(ValidationError::ExcerptTooLong);
    }
    Ok(Some(excerpt.to_string()))
}

pub fn validate_category(category: &str) -> Result<NewsCategory, ValidationError> {
    category
        .parse()
        .map_err(|_| ValidationError::UnknownCategory(category.to_string()))
}

/// Trims, drops blanks and de-duplicates while keeping the first occurrence's position.
pub fn normalize_tags(tags: Vec<String>) -> Result<Vec<String>, ValidationError> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());

    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() || normalized.iter().any(|existing| existing == tag) {
            continue;
        }
        if tag.chars().count() > MAX_TAG_LENGTH {
            return Err(ValidationError::TagTooLong(tag.to_string()));
        }
        normalized.push(tag.to_string());
    }

    if normalized.len() > MAX_TAGS {
        return Err(ValidationError::TooManyTags);
    }

    Ok(normalized)
}

/// Accepts absolute http(s) URLs with a host and returns them in canonical form.
pub fn validate_media_url(field: &'static str, raw: &str) -> Result<String, ValidationError> {
    let url = Url::parse(raw.trim()).map_err(|err| ValidationError::MalformedUrl {
        field,
        reason: err.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ValidationError::UnsupportedScheme {
                field,
                scheme: other.to_string(),
            });
        }
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(ValidationError::MalformedUrl {
            field,
            reason: "URL must have a host".to_string(),
        });
    }

    Ok(url.to_string())
}

pub fn validate_optional_url(
    field: &'static str,
    raw: Option<String>,
) -> Result<Option<String>, ValidationError> {
    match raw {
        Some(raw) if !raw.trim().is_empty() => validate_media_url(field, &raw).map(Some),
        _ => Ok(None),
    }
}

pub fn validate_url_list(
    field: &'static str,
    urls: Vec<String>,
) -> Result<Vec<String>, ValidationError> {
    urls.iter()
        .map(|raw| validate_media_url(field, raw))
        .collect()
}

/// Number of characters outside HTML tags, ignoring surrounding whitespace.
fn effective_length(html: &str) -> usize {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;

    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }

    text.trim().chars().count()
}
