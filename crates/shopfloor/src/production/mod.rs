//! Production logging, points pricing and productivity reporting.

pub mod aggregation;
pub mod auth;
pub mod averages;
pub mod cache;
pub mod dates;
pub mod domain;
pub mod import;
pub mod migration;
pub mod pricing;
pub mod recalc;
pub mod report;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use aggregation::{aggregate_by_day, recent_days, scope_logs, DayAggregate, DayOrder, LogWindow};
pub use auth::{CredentialVerifier, DigestCredentialStore, ADMIN_SUBJECT};
pub use averages::{compute_averages, efficiency_pct, ProductivityAverages};
pub use cache::RuleCache;
pub use domain::{
    Catalog, LogId, Operation, Operator, PointRule, ProductModel, ProductionLogEntry,
    ProductivityTarget, RuleDraft, RuleId, Sector, WorkSubmission,
};
pub use pricing::{compute_points, find_rule};
pub use recalc::{pending_updates, recalculate_all};
pub use report::{DailyDashboard, OperatorHistory, OperatorReport};
pub use repository::{
    CatalogRepository, LogFilter, LogRepository, RepositoryError, RuleRepository, SettingsStore,
};
pub use router::production_router;
pub use service::{
    ProductionService, ProductionServiceError, RecalculationSummary, RuleImportSummary,
};
