use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Production sectors of the plant, in floor order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sector {
    Corte,
    Armado,
    Costura,
    Montaje,
    Limpieza,
    Embalaje,
}

impl Sector {
    pub const fn ordered() -> [Self; 6] {
        [
            Self::Corte,
            Self::Armado,
            Self::Costura,
            Self::Montaje,
            Self::Limpieza,
            Self::Embalaje,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Corte => "Corte",
            Self::Armado => "Armado",
            Self::Costura => "Costura",
            Self::Montaje => "Montaje",
            Self::Limpieza => "Limpieza",
            Self::Embalaje => "Embalaje",
        }
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sector '{0}'")]
pub struct UnknownSector(pub String);

impl FromStr for Sector {
    type Err = UnknownSector;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ordered()
            .into_iter()
            .find(|sector| sector.label() == value)
            .ok_or_else(|| UnknownSector(value.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogId(pub String);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One priced cell of the points matrix.
///
/// The `(sector, model, operation)` triple is unique within the active rule
/// set. A missing rule is a valid state: the work is simply unpriced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRule {
    pub id: RuleId,
    pub sector: Sector,
    pub model: String,
    pub operation: String,
    pub points_per_unit: f64,
}

impl PointRule {
    pub fn matches(&self, sector: Sector, model: &str, operation: &str) -> bool {
        self.sector == sector && self.model == model && self.operation == operation
    }
}

/// Rule payload supplied by administrators; the id is assigned on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDraft {
    pub sector: Sector,
    pub model: String,
    pub operation: String,
    pub points_per_unit: f64,
}

impl RuleDraft {
    pub fn into_rule(self, id: RuleId) -> PointRule {
        PointRule {
            id,
            sector: self.sector,
            model: self.model,
            operation: self.operation,
            points_per_unit: self.points_per_unit,
        }
    }
}

/// One unit of recorded work.
///
/// `total_points == 0` with `quantity > 0` marks unrated work: no rule
/// matched when the entry was priced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionLogEntry {
    pub id: LogId,
    pub timestamp: NaiveDateTime,
    pub operator: String,
    pub sector: Sector,
    pub model: String,
    pub operation: String,
    pub quantity: u32,
    pub total_points: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ProductionLogEntry {
    pub fn work_date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn is_unrated(&self) -> bool {
        self.total_points == 0.0 && self.quantity > 0
    }
}

/// Operator-facing payload for recording or editing work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkSubmission {
    pub timestamp: NaiveDateTime,
    pub operator: String,
    pub sector: Sector,
    pub model: String,
    pub operation: String,
    pub quantity: u32,
    #[serde(default)]
    pub order_ref: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Points expected from one operator in one day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductivityTarget(pub f64);

impl ProductivityTarget {
    pub const DEFAULT_POINTS: f64 = 24960.0;

    pub fn points(self) -> f64 {
        self.0
    }
}

impl Default for ProductivityTarget {
    fn default() -> Self {
        Self(Self::DEFAULT_POINTS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub name: String,
    pub sector: Sector,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductModel {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    pub sector: Sector,
}

/// Snapshot of the pick lists maintained by administrators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub operators: Vec<Operator>,
    pub models: Vec<ProductModel>,
    pub operations: Vec<Operation>,
}
