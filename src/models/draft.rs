//! Draft model: unpublished form snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::content::ContentKind;

/// An unpublished JSON snapshot of an entity's form data
///
/// Keyed by content type and, when editing an existing row, the id of that
/// row. `version` increases on every save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub id: i64,
    pub content_type: ContentKind,
    pub original_id: Option<i64>,
    pub data: Value,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Draft {
    pub fn new(content_type: ContentKind, original_id: Option<i64>, data: Value) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            content_type,
            original_id,
            data,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Input for saving a draft of a new or existing row
#[derive(Debug, Clone, Deserialize)]
pub struct SaveDraftInput {
    #[serde(default)]
    pub original_id: Option<i64>,
    pub data: Value,
    /// Version the editor started from; omitted means overwrite
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Input for updating a draft by id
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateDraftInput {
    pub data: Value,
    #[serde(default)]
    pub expected_version: Option<i64>,
}
