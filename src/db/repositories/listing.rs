//! Package listing repository
//!
//! Denormalized package summaries, one row per `(listing, package_id)`.
//! Listing order follows the package's own position, so it is read through
//! a join instead of being stored twice. Package writes call
//! `replace_in_tx` so the summaries commit together with the row.

use crate::db::DynDatabasePool;
use crate::models::{ListingTarget, PackageListing};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Package listing repository trait
#[async_trait]
pub trait ListingRepository: Send + Sync {
    /// Summaries in one listing, ordered by package position
    async fn list(&self, target: ListingTarget) -> Result<Vec<PackageListing>>;

    /// Listings a package currently appears in
    async fn targets_for_package(&self, package_id: i64) -> Result<Vec<ListingTarget>>;
}

/// SQLx-based listing repository implementation
pub struct SqlxListingRepository {
    pool: DynDatabasePool,
}

impl SqlxListingRepository {
    /// Create a new SQLx listing repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ListingRepository> {
        Arc::new(Self::new(pool))
    }
}

macro_rules! dispatch {
    ($pool:expr, $func:ident($($arg:expr),*)) => {
        match ($pool.as_sqlite(), $pool.as_mysql()) {
            (Some(p), _) => sqlite::$func(p, $($arg),*).await,
            (_, Some(p)) => mysql::$func(p, $($arg),*).await,
            _ => anyhow::bail!("Database pool exposes no backend"),
        }
    };
}

#[async_trait]
impl ListingRepository for SqlxListingRepository {
    async fn list(&self, target: ListingTarget) -> Result<Vec<PackageListing>> {
        dispatch!(self.pool, list(target))
    }

    async fn targets_for_package(&self, package_id: i64) -> Result<Vec<ListingTarget>> {
        let listings = dispatch!(self.pool, targets(package_id))?;
        listings.iter().map(|l| l.parse()).collect()
    }
}

const TARGETS_SQL: &str = "SELECT listing FROM package_listings WHERE package_id = ? ORDER BY listing";

const INSERT_SQL: &str = r#"
    INSERT INTO package_listings
        (listing, package_id, title, slug, destination, duration, price, original_price, rating, image)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const LIST_SQL: &str = r#"
    SELECT l.listing, l.package_id, l.title, l.slug, l.destination, l.duration,
           l.price, l.original_price, l.rating, l.image, p.position
    FROM package_listings l
    INNER JOIN packages p ON p.id = l.package_id
    WHERE l.listing = ?
    ORDER BY p.position, p.id
"#;

// ============================================================================
// Backend implementations
// ============================================================================

macro_rules! listing_backend {
    ($module:ident, $db:ty, $pool:ty, $row:ty) => {
        pub(crate) mod $module {
            use super::*;

            /// Swap a package's listing rows inside the caller's transaction
            pub(crate) async fn replace_in_tx(
                tx: &mut sqlx::Transaction<'_, $db>,
                package_id: i64,
                listings: &[PackageListing],
            ) -> Result<()> {
                sqlx::query("DELETE FROM package_listings WHERE package_id = ?")
                    .bind(package_id)
                    .execute(&mut **tx)
                    .await
                    .context("Failed to clear package listings")?;

                for listing in listings {
                    sqlx::query(INSERT_SQL)
                        .bind(listing.listing.as_str())
                        .bind(package_id)
                        .bind(&listing.title)
                        .bind(&listing.slug)
                        .bind(&listing.destination)
                        .bind(&listing.duration)
                        .bind(listing.price)
                        .bind(listing.original_price)
                        .bind(listing.rating)
                        .bind(&listing.image)
                        .execute(&mut **tx)
                        .await
                        .with_context(|| {
                            format!("Failed to publish package {} to {}", package_id, listing.listing)
                        })?;
                }
                Ok(())
            }

            fn decode_row(row: &$row) -> Result<PackageListing> {
                let listing: String = row.try_get("listing")?;
                Ok(PackageListing {
                    listing: listing.parse()?,
                    package_id: row.try_get("package_id")?,
                    title: row.try_get("title")?,
                    slug: row.try_get("slug")?,
                    destination: row.try_get("destination")?,
                    duration: row.try_get("duration")?,
                    price: row.try_get("price")?,
                    original_price: row.try_get("original_price")?,
                    rating: row.try_get("rating")?,
                    image: row.try_get("image")?,
                    position: row.try_get("position")?,
                })
            }

            pub(super) async fn list(pool: &$pool, target: ListingTarget) -> Result<Vec<PackageListing>> {
                let rows = sqlx::query(LIST_SQL)
                    .bind(target.as_str())
                    .fetch_all(pool)
                    .await
                    .with_context(|| format!("Failed to list {} packages", target))?;

                rows.iter().map(decode_row).collect()
            }

            pub(super) async fn targets(pool: &$pool, package_id: i64) -> Result<Vec<String>> {
                sqlx::query_scalar(TARGETS_SQL)
                    .bind(package_id)
                    .fetch_all(pool)
                    .await
                    .context("Failed to read package listings")
            }
        }
    };
}

listing_backend!(sqlite, sqlx::Sqlite, SqlitePool, sqlx::sqlite::SqliteRow);
listing_backend!(mysql, sqlx::MySql, MySqlPool, sqlx::mysql::MySqlRow);
