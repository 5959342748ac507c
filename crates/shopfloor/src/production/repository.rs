use serde::{Deserialize, Serialize};

use super::aggregation::LogWindow;
use super::domain::{
    Catalog, LogId, Operation, Operator, PointRule, ProductModel, ProductionLogEntry, RuleId,
};

/// Query over stored log entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
    pub window: LogWindow,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
}

impl LogFilter {
    pub fn new(window: LogWindow) -> Self {
        Self {
            window,
            operator: None,
        }
    }

    pub fn for_operator(window: LogWindow, operator: impl Into<String>) -> Self {
        Self {
            window,
            operator: Some(operator.into()),
        }
    }

    pub fn matches(&self, entry: &ProductionLogEntry) -> bool {
        self.window.contains(entry.work_date())
            && self
                .operator
                .as_deref()
                .map_or(true, |operator| entry.operator == operator)
    }
}

/// Storage for the points matrix.
///
/// `revision` must change after every successful write so cached copies of
/// the rule set can detect that they are stale.
pub trait RuleRepository: Send + Sync {
    fn all(&self) -> Result<Vec<PointRule>, RepositoryError>;
    fn insert(&self, rule: PointRule) -> Result<PointRule, RepositoryError>;
    fn update(&self, rule: PointRule) -> Result<(), RepositoryError>;
    fn delete(&self, id: &RuleId) -> Result<(), RepositoryError>;
    fn revision(&self) -> Result<u64, RepositoryError>;
}

/// Storage for production logs. `query` returns newest entries first.
pub trait LogRepository: Send + Sync {
    fn insert(&self, entry: ProductionLogEntry) -> Result<ProductionLogEntry, RepositoryError>;
    fn update(&self, entry: ProductionLogEntry) -> Result<(), RepositoryError>;
    /// Writes one chunk of updates, returning how many were applied.
    fn update_batch(&self, entries: &[ProductionLogEntry]) -> Result<usize, RepositoryError>;
    fn delete(&self, id: &LogId) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &LogId) -> Result<Option<ProductionLogEntry>, RepositoryError>;
    fn query(&self, filter: &LogFilter) -> Result<Vec<ProductionLogEntry>, RepositoryError>;
}

/// Global settings. `None` means the value was never configured.
pub trait SettingsStore: Send + Sync {
    fn productivity_target(&self) -> Result<Option<f64>, RepositoryError>;
    fn set_productivity_target(&self, points: f64) -> Result<(), RepositoryError>;
}

pub trait CatalogRepository: Send + Sync {
    fn catalog(&self) -> Result<Catalog, RepositoryError>;
    fn insert_operator(&self, operator: Operator) -> Result<(), RepositoryError>;
    fn insert_model(&self, model: ProductModel) -> Result<(), RepositoryError>;
    fn insert_operation(&self, operation: Operation) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
