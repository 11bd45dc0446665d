//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Content tables share one schema-driven repository; drafts and package
//! listings have their own.

pub mod content;
pub mod draft;
pub mod listing;

pub use content::{ContentRepository, ListFilter, SqlxContentRepository};
pub use draft::{DraftRepository, DraftWrite, SqlxDraftRepository};
pub use listing::{ListingRepository, SqlxListingRepository};
