//! Common API utilities and shared types

use serde::{Deserialize, Serialize};

use crate::api::middleware::ApiError;
use crate::models::{ContentKind, ListingTarget};

/// Parse a content kind path segment (`blog-posts`, `blog_posts`, ...)
pub fn parse_kind(raw: &str) -> Result<ContentKind, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::not_found(format!("Unknown content kind: {}", raw)))
}

pub fn parse_target(raw: &str) -> Result<ListingTarget, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::not_found(format!("Unknown listing: {}", raw)))
}

/// List response
#[derive(Debug, Serialize)]
pub struct ItemsResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> From<Vec<T>> for ItemsResponse<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            total: items.len(),
            items,
        }
    }
}

/// Single item response
#[derive(Debug, Serialize)]
pub struct ItemResponse<T> {
    pub item: T,
}

/// `?group=` filter for grouped kinds
#[derive(Debug, Default, Deserialize)]
pub struct GroupQuery {
    pub group: Option<String>,
}
