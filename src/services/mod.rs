//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories:
//! - Validating input against the content schemas
//! - Keeping positions, flags and package listings consistent
//! - Invalidating cached read models after writes

pub mod content;
pub mod csv_import;
pub mod draft;
pub mod package;

pub use content::{generate_slug, prepare_create, prepare_update, ContentService, ContentServiceError};
pub use csv_import::{template, ImportError, ImportReport, ImportService, SkippedRow};
pub use draft::{DraftService, DraftServiceError};
pub use package::PackageService;
