//! One-time conversion of legacy log documents into [`ProductionLogEntry`].
//!
//! Older documents spelled several fields differently. Each field is looked
//! up under its current name first and its legacy name second; once migrated,
//! nothing else in the crate reads the legacy names.

use serde::Serialize;
use serde_json::{Map, Value};

use super::domain::{LogId, ProductionLogEntry, Sector};
use super::import::parse_timestamp;

const TIMESTAMP_KEYS: [&str; 2] = ["timestamp", "fecha"];
const OPERATOR_KEYS: [&str; 2] = ["operator", "operario"];
const POINTS_KEYS: [&str; 2] = ["total_points", "points"];
const ORDER_KEYS: [&str; 2] = ["order_ref", "lote"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MigrationError {
    #[error("document is not a JSON object")]
    NotAnObject,
    #[error("missing field '{0}'")]
    MissingField(&'static str),
    #[error("field '{field}' is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationFailure {
    pub index: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MigrationReport {
    pub entries: Vec<ProductionLogEntry>,
    pub failures: Vec<MigrationFailure>,
}

/// Migrates every document it can, collecting per-document failures.
pub fn migrate_documents(documents: &[Value]) -> MigrationReport {
    let mut report = MigrationReport::default();

    for (index, document) in documents.iter().enumerate() {
        match migrate_document(index, document) {
            Ok(entry) => report.entries.push(entry),
            Err(error) => report.failures.push(MigrationFailure {
                index,
                error: error.to_string(),
            }),
        }
    }

    report
}

pub fn migrate_document(index: usize, document: &Value) -> Result<ProductionLogEntry, MigrationError> {
    let fields = document.as_object().ok_or(MigrationError::NotAnObject)?;

    let id = match first_present(fields, &["id"]) {
        Some(value) => LogId(string_field("id", value)?),
        None => LogId(format!("legacy-{index:06}")),
    };

    let raw_timestamp = string_field(
        "timestamp",
        first_present(fields, &TIMESTAMP_KEYS).ok_or(MigrationError::MissingField("timestamp"))?,
    )?;
    let timestamp =
        parse_timestamp(&raw_timestamp).ok_or_else(|| MigrationError::InvalidField {
            field: "timestamp",
            reason: format!("unrecognised value '{raw_timestamp}'"),
        })?;

    let operator = required_string(fields, "operator", &OPERATOR_KEYS)?;
    let sector = required_string(fields, "sector", &["sector"])?
        .parse::<Sector>()
        .map_err(|err| MigrationError::InvalidField {
            field: "sector",
            reason: err.to_string(),
        })?;
    let model = required_string(fields, "model", &["model"])?;
    let operation = required_string(fields, "operation", &["operation"])?;

    let quantity = first_present(fields, &["quantity"])
        .ok_or(MigrationError::MissingField("quantity"))?
        .as_u64()
        .and_then(|value| u32::try_from(value).ok())
        .ok_or_else(|| MigrationError::InvalidField {
            field: "quantity",
            reason: "expected a non-negative integer".to_string(),
        })?;
    if quantity == 0 {
        return Err(MigrationError::InvalidField {
            field: "quantity",
            reason: "must be greater than zero".to_string(),
        });
    }

    let total_points = first_present(fields, &POINTS_KEYS)
        .ok_or(MigrationError::MissingField("total_points"))?
        .as_f64()
        .ok_or_else(|| MigrationError::InvalidField {
            field: "total_points",
            reason: "expected a number".to_string(),
        })?;

    let order_ref = optional_string(fields, "order_ref", &ORDER_KEYS)?;
    let comment = optional_string(fields, "comment", &["comment"])?;

    Ok(ProductionLogEntry {
        id,
        timestamp,
        operator,
        sector,
        model,
        operation,
        quantity,
        total_points,
        order_ref,
        comment,
    })
}

fn first_present<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| fields.get(*key))
        .find(|value| !value.is_null())
}

fn string_field(field: &'static str, value: &Value) -> Result<String, MigrationError> {
    match value {
        Value::String(text) => Ok(text.trim().to_string()),
        Value::Number(number) => Ok(number.to_string()),
        _ => Err(MigrationError::InvalidField {
            field,
            reason: "expected a string".to_string(),
        }),
    }
}

fn required_string(
    fields: &Map<String, Value>,
    field: &'static str,
    keys: &[&str],
) -> Result<String, MigrationError> {
    let value = first_present(fields, keys).ok_or(MigrationError::MissingField(field))?;
    string_field(field, value)
}

fn optional_string(
    fields: &Map<String, Value>,
    field: &'static str,
    keys: &[&str],
) -> Result<Option<String>, MigrationError> {
    first_present(fields, keys)
        .map(|value| string_field(field, value))
        .transpose()
        .map(|value| value.filter(|text| !text.is_empty()))
}
