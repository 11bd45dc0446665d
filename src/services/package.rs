//! Package publication
//!
//! A package's `publish_to` list decides which secondary listings carry its
//! summary. The summaries are written by the content repository together
//! with the package row; this service serves them to the public site.

use crate::cache::{keys, CacheLayer, SharedCache};
use crate::db::repositories::ListingRepository;
use crate::models::{ListingTarget, PackageListing};
use anyhow::{Context, Result};
use std::sync::Arc;

pub struct PackageService {
    repo: Arc<dyn ListingRepository>,
    cache: SharedCache,
}

impl PackageService {
    pub fn new(repo: Arc<dyn ListingRepository>, cache: SharedCache) -> Self {
        Self { repo, cache }
    }

    /// Package summaries in one listing, in package order
    pub async fn list_listing(&self, target: ListingTarget) -> Result<Vec<PackageListing>> {
        let cache_key = keys::listing(target);
        if let Ok(Some(cached)) = self.cache.get::<Vec<PackageListing>>(&cache_key).await {
            return Ok(cached);
        }

        let listings = self
            .repo
            .list(target)
            .await
            .with_context(|| format!("Failed to load {} listing", target))?;

        if let Err(e) = self.cache.set(&cache_key, &listings).await {
            tracing::warn!("Failed to cache {}: {}", cache_key, e);
        }
        Ok(listings)
    }

    pub async fn targets_for(&self, package_id: i64) -> Result<Vec<ListingTarget>> {
        self.repo.targets_for_package(package_id).await
    }
}
