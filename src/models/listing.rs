//! Secondary package listings fed by `publish_to`

use crate::models::{ContentKind, ContentRecord};
use serde::{Deserialize, Serialize};

/// A secondary listing a package can be published into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListingTarget {
    Featured,
    Trending,
    Honeymoon,
    GroupTours,
    WeekendGetaways,
}

impl ListingTarget {
    pub const ALL: [ListingTarget; 5] = [
        Self::Featured,
        Self::Trending,
        Self::Honeymoon,
        Self::GroupTours,
        Self::WeekendGetaways,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Featured => "featured",
            Self::Trending => "trending",
            Self::Honeymoon => "honeymoon",
            Self::GroupTours => "group-tours",
            Self::WeekendGetaways => "weekend-getaways",
        }
    }
}

impl std::fmt::Display for ListingTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ListingTarget {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', ' '], "-");
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| anyhow::anyhow!("Unknown listing target: {}", s))
    }
}

/// Denormalized package summary copied into a listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageListing {
    pub listing: ListingTarget,
    pub package_id: i64,
    pub title: String,
    pub slug: Option<String>,
    pub destination: Option<String>,
    pub duration: Option<String>,
    pub price: f64,
    pub original_price: f64,
    pub rating: f64,
    pub image: Option<String>,
    pub position: i32,
}

impl PackageListing {
    /// Summaries for every target an active package is published to.
    /// Inactive packages appear nowhere.
    pub fn for_package(package: &ContentRecord) -> Vec<PackageListing> {
        let schema = ContentKind::Package.schema();
        if !package.flag(schema) {
            return Vec::new();
        }

        let mut targets: Vec<ListingTarget> = Vec::new();
        for raw in package.list("publish_to") {
            match raw.parse::<ListingTarget>() {
                Ok(target) if !targets.contains(&target) => targets.push(target),
                Ok(_) => {}
                Err(e) => tracing::warn!("Package {}: {}", package.id, e),
            }
        }

        let text = |name: &str| package.text(name).map(str::to_string);
        targets
            .into_iter()
            .map(|listing| PackageListing {
                listing,
                package_id: package.id,
                title: package.title(schema).to_string(),
                slug: text("slug"),
                destination: text("destination"),
                duration: text("duration"),
                price: package.number("price").unwrap_or(0.0),
                original_price: package.number("original_price").unwrap_or(0.0),
                rating: package.number("rating").unwrap_or(5.0),
                image: package.list("images").into_iter().next(),
                position: package.position,
            })
            .collect()
    }
}
