//! CSV import and export
//!
//! One convention for every content kind:
//! - Tab delimiter when the header line contains a tab, comma otherwise
//! - Standard quoting (`"a, b"`, `""` for a literal quote)
//! - List columns are `;`-separated inside one cell
//! - Booleans are the literals `true`/`false`
//! - Numbers are stripped of anything but digits, `.` and `-`; unparsable
//!   values fall back to the field default
//! - Rows with an empty title column are discarded
//!
//! Imports are all-or-nothing: accepted rows are inserted in one
//! transaction, and in strict mode a single invalid row aborts the batch.

use crate::config::ImportConfig;
use crate::models::{ContentKind, EntitySchema, FieldDef, FieldKind, Fields};
use crate::services::content::{prepare_create, ContentService, ContentServiceError};
use anyhow::Context;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

const NON_NUMERIC: &str = r"[^0-9.\-]";

/// Error types for CSV import
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// The input can't be read as a table for this kind
    #[error("{0}")]
    ValidationError(String),

    /// Strict mode: at least one row failed validation; nothing was written
    #[error("Import rejected: {} invalid row(s)", .0.skipped.len())]
    Rejected(ImportReport),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<ContentServiceError> for ImportError {
    fn from(err: ContentServiceError) -> Self {
        match err {
            ContentServiceError::InternalError(e) => Self::InternalError(e),
            other => Self::ValidationError(other.to_string()),
        }
    }
}

/// A data row that was not imported
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRow {
    /// 1-based line number in the input
    pub line: u64,
    pub reason: String,
}

/// Outcome of an import
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    /// Non-blank data rows read
    pub total_rows: usize,
    /// Rows that passed validation
    pub accepted: usize,
    /// Rows written; zero on a dry run
    pub inserted: usize,
    pub dry_run: bool,
    pub skipped: Vec<SkippedRow>,
    pub warnings: Vec<String>,
}

/// Rows read from CSV, before anything is written
#[derive(Debug, Default)]
struct ParsedImport {
    rows: Vec<Fields>,
    /// Rows dropped for an empty title; never abort an import
    discarded: Vec<SkippedRow>,
    /// Rows that failed validation
    invalid: Vec<SkippedRow>,
    total_rows: usize,
    warnings: Vec<String>,
}

pub struct ImportService {
    content: Arc<ContentService>,
    config: ImportConfig,
}

impl ImportService {
    pub fn new(content: Arc<ContentService>, config: ImportConfig) -> Self {
        Self { content, config }
    }

    /// Parse, validate and (unless `dry_run`) insert CSV rows
    pub async fn import(
        &self,
        kind: ContentKind,
        text: &str,
        dry_run: bool,
    ) -> Result<ImportReport, ImportError> {
        let parsed = parse_rows(kind.schema(), text, self.config.max_rows)?;

        let mut skipped = parsed.discarded;
        skipped.extend(parsed.invalid.iter().cloned());
        skipped.sort_by_key(|s| s.line);

        let mut report = ImportReport {
            total_rows: parsed.total_rows,
            accepted: parsed.rows.len(),
            inserted: 0,
            dry_run,
            skipped,
            warnings: parsed.warnings,
        };

        if self.config.strict && !parsed.invalid.is_empty() {
            tracing::warn!(
                "Rejected {} import: {} invalid row(s)",
                kind,
                parsed.invalid.len()
            );
            return Err(ImportError::Rejected(report));
        }

        if !dry_run && !parsed.rows.is_empty() {
            let ids = self.content.insert_prepared(kind, &parsed.rows).await?;
            report.inserted = ids.len();
        }

        tracing::info!(
            "Imported {} {} row(s) of {} (dry run: {}, skipped: {})",
            report.inserted,
            kind,
            report.total_rows,
            dry_run,
            report.skipped.len()
        );
        Ok(report)
    }

    /// All rows of a kind as CSV, in position order
    pub async fn export(&self, kind: ContentKind) -> Result<String, ImportError> {
        let schema = kind.schema();
        let records = self.content.list(kind, None).await?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(schema.column_names())
            .context("Failed to write CSV header")?;
        for record in &records {
            let cells = schema
                .fields
                .iter()
                .map(|field| format_cell(field, record.fields.get(field.name)));
            writer.write_record(cells).context("Failed to write CSV row")?;
        }

        finish(writer)
    }
}

/// Header line of every importable column plus one example row
pub fn template(kind: ContentKind) -> Result<String, ImportError> {
    let schema = kind.schema();
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(schema.column_names())
        .context("Failed to write CSV header")?;
    writer
        .write_record(schema.fields.iter().map(|f| f.example))
        .context("Failed to write CSV example")?;
    finish(writer)
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String, ImportError> {
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV: {}", e))?;
    String::from_utf8(bytes)
        .context("CSV output is not UTF-8")
        .map_err(Into::into)
}

/// Header names match case-insensitively; spaces and dashes read as `_`
fn normalize_header(raw: &str) -> String {
    raw.trim().to_lowercase().replace([' ', '-'], "_")
}

fn detect_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or_default();
    if header.contains('\t') {
        b'\t'
    } else {
        b','
    }
}

fn parse_rows(
    schema: &EntitySchema,
    text: &str,
    max_rows: usize,
) -> Result<ParsedImport, ImportError> {
    let text = text.trim_start_matches('\u{FEFF}');
    if text.trim().is_empty() {
        return Err(ImportError::ValidationError("CSV input is empty".to_string()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(detect_delimiter(text))
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ImportError::ValidationError(format!("Failed to read CSV header: {}", e)))?
        .clone();

    let non_numeric = Regex::new(NON_NUMERIC).context("Invalid number filter")?;
    let mut parsed = ParsedImport::default();
    let mut columns: Vec<Option<&FieldDef>> = Vec::with_capacity(headers.len());
    for raw in headers.iter() {
        let name = normalize_header(raw);
        let field = schema.field(&name);
        if field.is_none() && !name.is_empty() {
            parsed
                .warnings
                .push(format!("Unknown column '{}' ignored", raw.trim()));
        }
        if field.is_some() && columns.iter().flatten().any(|f| f.name == name) {
            parsed
                .warnings
                .push(format!("Duplicate column '{}': last one wins", raw.trim()));
        }
        columns.push(field);
    }

    if !columns.iter().flatten().any(|f| f.name == schema.title_field) {
        return Err(ImportError::ValidationError(format!(
            "Missing required column '{}'",
            schema.title_field
        )));
    }

    for result in reader.records() {
        let record = result
            .map_err(|e| ImportError::ValidationError(format!("Malformed CSV: {}", e)))?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        parsed.total_rows += 1;
        if parsed.total_rows > max_rows {
            return Err(ImportError::ValidationError(format!(
                "Import is limited to {} rows",
                max_rows
            )));
        }
        let line = record.position().map_or(0, |p| p.line());

        let mut fields = Fields::new();
        for (field, cell) in columns.iter().zip(record.iter()) {
            if let Some(field) = field {
                let (value, warning) = coerce_cell(field, cell, &non_numeric);
                if let Some(warning) = warning {
                    parsed.warnings.push(format!("Line {}: {}", line, warning));
                }
                fields.insert(field.name.to_string(), value);
            }
        }

        let title = fields
            .get(schema.title_field)
            .and_then(Value::as_str)
            .unwrap_or_default();
        if title.trim().is_empty() {
            parsed.discarded.push(SkippedRow {
                line,
                reason: format!("Empty {}", schema.title_field),
            });
            continue;
        }

        match prepare_create(schema, &fields) {
            Ok(prepared) => parsed.rows.push(prepared),
            Err(e) => parsed.invalid.push(SkippedRow {
                line,
                reason: e.to_string(),
            }),
        }
    }

    Ok(parsed)
}

/// Turn one cell into a field value. Blank cells take the field default;
/// the second element is a warning when a value was replaced.
fn coerce_cell(field: &FieldDef, raw: &str, non_numeric: &Regex) -> (Value, Option<String>) {
    let cell = raw.trim();
    if cell.is_empty() {
        return (field.default.to_value(), None);
    }

    let fallback = |what: &str| {
        (
            field.default.to_value(),
            Some(format!(
                "invalid {} '{}' in '{}', using default",
                what, cell, field.name
            )),
        )
    };

    match field.kind {
        FieldKind::Text => (Value::String(cell.to_string()), None),
        FieldKind::Integer => match parse_number(cell, non_numeric) {
            Some(n) => (Value::from(n.trunc() as i64), None),
            None => fallback("number"),
        },
        FieldKind::Number => match parse_number(cell, non_numeric) {
            Some(n) => (Value::from(n), None),
            None => fallback("number"),
        },
        FieldKind::Boolean => (Value::Bool(cell == "true"), None),
        FieldKind::List => {
            let items: Vec<String> = cell
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            (Value::from(items), None)
        }
        FieldKind::Json => match serde_json::from_str::<Value>(cell) {
            Ok(value) => (value, None),
            Err(_) => fallback("JSON"),
        },
    }
}

fn parse_number(cell: &str, non_numeric: &Regex) -> Option<f64> {
    let stripped = non_numeric.replace_all(cell, "");
    stripped.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn format_cell(field: &FieldDef, value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Array(items)) if field.kind == FieldKind::List => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(";"),
        Some(other) => other.to_string(),
    }
}
