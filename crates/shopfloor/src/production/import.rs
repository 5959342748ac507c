//! CSV readers for the points matrix and for bulk production logs.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};
use std::io::Read;

use super::domain::{LogId, PointRule, ProductionLogEntry, RuleDraft, Sector, WorkSubmission};
use super::pricing::compute_points;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("invalid CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("line {line}: unknown sector '{value}'")]
    UnknownSector { line: usize, value: String },
    #[error("line {line}: points per unit must be a non-negative number")]
    InvalidPoints { line: usize },
    #[error("line {line}: quantity must be greater than zero")]
    InvalidQuantity { line: usize },
    #[error("line {line}: unrecognised timestamp '{value}'")]
    InvalidTimestamp { line: usize, value: String },
}

#[derive(Debug, Deserialize)]
struct RuleRow {
    sector: String,
    model: String,
    operation: String,
    points_per_unit: f64,
}

#[derive(Debug, Deserialize)]
struct LogRow {
    timestamp: String,
    operator: String,
    sector: String,
    model: String,
    operation: String,
    quantity: u32,
    #[serde(default)]
    total_points: Option<f64>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    order_ref: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    comment: Option<String>,
}

/// A log row read from CSV, priced only if the file carried points.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedLog {
    pub line: usize,
    pub submission: WorkSubmission,
    pub total_points: Option<f64>,
}

impl ImportedLog {
    /// Builds a log entry, pricing it against `rules` when the file left
    /// the points column empty.
    pub fn into_entry(self, rules: &[PointRule]) -> ProductionLogEntry {
        let submission = self.submission;
        let total_points = self.total_points.unwrap_or_else(|| {
            compute_points(
                rules,
                submission.sector,
                &submission.model,
                &submission.operation,
                submission.quantity,
            )
        });

        ProductionLogEntry {
            id: LogId(format!("import-{:06}", self.line)),
            timestamp: submission.timestamp,
            operator: submission.operator,
            sector: submission.sector,
            model: submission.model,
            operation: submission.operation,
            quantity: submission.quantity,
            total_points,
            order_ref: submission.order_ref,
            comment: submission.comment,
        }
    }
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
}

// Data rows start on line 2, after the header.
fn line_number(index: usize) -> usize {
    index + 2
}

fn parse_sector(line: usize, value: &str) -> Result<Sector, ImportError> {
    value.parse().map_err(|_| ImportError::UnknownSector {
        line,
        value: value.to_string(),
    })
}

/// Reads `sector,model,operation,points_per_unit` rows.
pub fn parse_rules<R: Read>(reader: R) -> Result<Vec<RuleDraft>, ImportError> {
    let mut drafts = Vec::new();

    for (index, record) in csv_reader(reader).deserialize::<RuleRow>().enumerate() {
        let row = record?;
        let line = line_number(index);
        let sector = parse_sector(line, &row.sector)?;
        if !(row.points_per_unit.is_finite() && row.points_per_unit >= 0.0) {
            return Err(ImportError::InvalidPoints { line });
        }

        drafts.push(RuleDraft {
            sector,
            model: row.model,
            operation: row.operation,
            points_per_unit: row.points_per_unit,
        });
    }

    Ok(drafts)
}

/// Reads `timestamp,operator,sector,model,operation,quantity` rows with
/// optional `total_points`, `order_ref` and `comment` columns.
pub fn parse_logs<R: Read>(reader: R) -> Result<Vec<ImportedLog>, ImportError> {
    let mut logs = Vec::new();

    for (index, record) in csv_reader(reader).deserialize::<LogRow>().enumerate() {
        let row = record?;
        let line = line_number(index);
        let sector = parse_sector(line, &row.sector)?;
        let timestamp =
            parse_timestamp(&row.timestamp).ok_or_else(|| ImportError::InvalidTimestamp {
                line,
                value: row.timestamp.clone(),
            })?;
        if row.quantity == 0 {
            return Err(ImportError::InvalidQuantity { line });
        }

        logs.push(ImportedLog {
            line,
            submission: WorkSubmission {
                timestamp,
                operator: row.operator,
                sector,
                model: row.model,
                operation: row.operation,
                quantity: row.quantity,
                order_ref: row.order_ref,
                comment: row.comment,
            },
            total_points: row.total_points,
        });
    }

    Ok(logs)
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

/// Parses the timestamp spellings found in plant exports.
///
/// Offsets on RFC 3339 values are dropped: the wall-clock reading is kept as
/// plant-local time.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_local());
    }

    for format in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}
