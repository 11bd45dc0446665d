//! Declarative content schemas
//!
//! Every content table shares one shape (id, position, flag, timestamps) and
//! differs only in its fields. A schema lists those fields once; CRUD,
//! validation, CSV coercion and template generation all read from it.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::Value;

use super::content::ContentKind;

/// Storage and coercion type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Free text
    Text,
    /// Whole number
    Integer,
    /// Decimal number
    Number,
    /// `true`/`false`
    Boolean,
    /// Array of strings, `;`-separated in CSV, JSON text in the database
    List,
    /// Arbitrary JSON, JSON text in the database
    Json,
}

/// Value used when a field is absent on create or blank in CSV
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldDefault {
    Null,
    Text(&'static str),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    EmptyList,
}

impl FieldDefault {
    pub fn to_value(self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Text(s) => Value::String(s.to_string()),
            Self::Integer(i) => Value::from(i),
            Self::Number(n) => Value::from(n),
            Self::Boolean(b) => Value::Bool(b),
            Self::EmptyList => Value::Array(Vec::new()),
        }
    }
}

impl Serialize for FieldDefault {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// One column of a content table
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub default: FieldDefault,
    /// Sample cell used by the CSV template
    #[serde(skip)]
    pub example: &'static str,
}

impl FieldDef {
    const fn new(name: &'static str, kind: FieldKind, default: FieldDefault) -> Self {
        Self {
            name,
            kind,
            required: false,
            default,
            example: "",
        }
    }

    pub const fn text(name: &'static str) -> Self {
        Self::new(name, FieldKind::Text, FieldDefault::Null)
    }

    pub const fn integer(name: &'static str, default: i64) -> Self {
        Self::new(name, FieldKind::Integer, FieldDefault::Integer(default))
    }

    pub const fn number(name: &'static str, default: f64) -> Self {
        Self::new(name, FieldKind::Number, FieldDefault::Number(default))
    }

    pub const fn boolean(name: &'static str, default: bool) -> Self {
        Self::new(name, FieldKind::Boolean, FieldDefault::Boolean(default))
    }

    pub const fn list(name: &'static str) -> Self {
        Self::new(name, FieldKind::List, FieldDefault::EmptyList)
    }

    pub const fn json(name: &'static str) -> Self {
        Self::new(name, FieldKind::Json, FieldDefault::Null)
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn example(mut self, example: &'static str) -> Self {
        self.example = example;
        self
    }
}

/// Description of one content table
#[derive(Debug)]
pub struct EntitySchema {
    pub kind: ContentKind,
    pub table: &'static str,
    /// Primary identifying column; a row without it is meaningless
    pub title_field: &'static str,
    /// Visibility column (`is_active` or `published`)
    pub flag_field: &'static str,
    /// Column that scopes ordering, if rows are ordered per group
    pub group_field: Option<&'static str>,
    /// At most one row may have the flag set
    pub singleton_flag: bool,
    /// Text column stamped with the time the flag is first set
    pub publish_stamp: Option<&'static str>,
    pub fields: &'static [FieldDef],
}

impl EntitySchema {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }

    /// Comma-separated select list including the fixed columns
    pub fn select_list(&self) -> String {
        let mut columns = vec!["id", "position"];
        columns.extend(self.column_names());
        columns.extend(["created_at", "updated_at"]);
        columns.join(", ")
    }
}

impl Serialize for EntitySchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("EntitySchema", 7)?;
        state.serialize_field("kind", &self.kind)?;
        state.serialize_field("title_field", self.title_field)?;
        state.serialize_field("flag_field", self.flag_field)?;
        state.serialize_field("group_field", &self.group_field)?;
        state.serialize_field("singleton_flag", &self.singleton_flag)?;
        state.serialize_field("publish_stamp", &self.publish_stamp)?;
        state.serialize_field("fields", self.fields)?;
        state.end()
    }
}
