//! News query and mutation layers over a [`NewsRepository`].
//!
//! Reads normalize every row so callers never branch on missing columns.
//! Writes validate input before the store is touched and derive
//! `published_at` on first publish.

mod mutation;
mod query;

use crate::models::DEFAULT_PAGE_SIZE;
use crate::repositories::NewsRepository;

pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Clone)]
pub struct NewsService<R> {
    repo: R,
    default_page_size: u32,
    max_page_size: u32,
}

impl<R: NewsRepository> NewsService<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }

    pub fn with_page_sizes(mut self, default_page_size: u32, max_page_size: u32) -> Self {
        self.max_page_size = max_page_size.max(1);
        self.default_page_size = default_page_size.clamp(1, self.max_page_size);
        self
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn default_page_size(&self) -> u32 {
        self.default_page_size
    }
}
