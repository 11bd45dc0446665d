//! Data models
//!
//! - Content kinds and their declarative schemas
//! - Stored content records and mutation inputs
//! - Manual ordering plans
//! - Drafts
//! - Package listing summaries

mod content;
mod draft;
mod listing;
mod ordering;
mod schema;

pub use content::{
    ContentKind, ContentRecord, Fields, FlagInput, MoveDirection, MoveInput, ReorderInput,
};
pub use draft::{Draft, SaveDraftInput, UpdateDraftInput};
pub use listing::{ListingTarget, PackageListing};
pub use ordering::{position_updates, OrderChange, OrderError};
pub use schema::{EntitySchema, FieldDef, FieldDefault, FieldKind};
