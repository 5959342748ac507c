use std::io::Read;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use super::aggregation::{LogWindow, LONG_HISTORY_DAYS};
use super::auth::{CredentialVerifier, ADMIN_SUBJECT};
use super::cache::RuleCache;
use super::domain::{
    Catalog, LogId, Operation, Operator, PointRule, ProductModel, ProductionLogEntry,
    ProductivityTarget, RuleDraft, RuleId, WorkSubmission,
};
use super::import::{parse_rules, ImportError};
use super::pricing::{compute_points, find_rule};
use super::recalc::{pending_updates, RECALCULATION_EPSILON};
use super::report::{DailyDashboard, OperatorHistory, OperatorReport};
use super::repository::{
    CatalogRepository, LogFilter, LogRepository, RepositoryError, RuleRepository, SettingsStore,
};
use crate::config::ProductionConfig;

/// Service composing the rule matrix, production logs, settings and catalog.
pub struct ProductionService<R, L, S, C> {
    rules: Arc<R>,
    logs: Arc<L>,
    settings: Arc<S>,
    catalog: Arc<C>,
    verifier: Arc<dyn CredentialVerifier>,
    cache: RuleCache,
    config: ProductionConfig,
}

static LOG_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static RULE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_log_id() -> LogId {
    let id = LOG_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    LogId(format!("log-{id:06}"))
}

fn next_rule_id() -> RuleId {
    let id = RULE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RuleId(format!("rule-{id:06}"))
}

/// Outcome of a points-matrix CSV import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RuleImportSummary {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

/// Outcome of re-pricing every stored log against the current matrix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecalculationSummary {
    pub examined: usize,
    pub stale: usize,
    pub updated: usize,
    pub failed_batches: usize,
}

impl<R, L, S, C> ProductionService<R, L, S, C>
where
    R: RuleRepository + 'static,
    L: LogRepository + 'static,
    S: SettingsStore + 'static,
    C: CatalogRepository + 'static,
{
    pub fn new(
        rules: Arc<R>,
        logs: Arc<L>,
        settings: Arc<S>,
        catalog: Arc<C>,
        verifier: Arc<dyn CredentialVerifier>,
        config: ProductionConfig,
    ) -> Self {
        let cache = RuleCache::new(config.rule_cache_ttl);
        Self {
            rules,
            logs,
            settings,
            catalog,
            verifier,
            cache,
            config,
        }
    }

    fn current_rules(&self) -> Result<Arc<Vec<PointRule>>, RepositoryError> {
        self.cache.get_or_load(self.rules.as_ref())
    }

    fn price(&self, submission: &WorkSubmission) -> Result<f64, RepositoryError> {
        let rules = self.current_rules()?;
        Ok(compute_points(
            &rules,
            submission.sector,
            &submission.model,
            &submission.operation,
            submission.quantity,
        ))
    }

    /// Record completed work, pricing it against the current matrix.
    pub fn log_work(
        &self,
        submission: WorkSubmission,
    ) -> Result<ProductionLogEntry, ProductionServiceError> {
        validate_submission(&submission)?;
        let total_points = self.price(&submission)?;
        let entry = entry_from_submission(next_log_id(), submission, total_points);

        let stored = self.logs.insert(entry)?;
        info!(
            log_id = %stored.id,
            operator = %stored.operator,
            points = stored.total_points,
            unrated = stored.is_unrated(),
            "production logged"
        );
        Ok(stored)
    }

    /// Replace a log's contents and re-price it.
    pub fn edit_log(
        &self,
        id: &LogId,
        submission: WorkSubmission,
    ) -> Result<ProductionLogEntry, ProductionServiceError> {
        validate_submission(&submission)?;
        self.logs.fetch(id)?.ok_or(RepositoryError::NotFound)?;

        let total_points = self.price(&submission)?;
        let entry = entry_from_submission(id.clone(), submission, total_points);
        self.logs.update(entry.clone())?;
        info!(log_id = %entry.id, points = entry.total_points, "production log edited");
        Ok(entry)
    }

    pub fn delete_log(&self, id: &LogId) -> Result<(), ProductionServiceError> {
        self.logs.delete(id)?;
        info!(log_id = %id, "production log deleted");
        Ok(())
    }

    pub fn logs(
        &self,
        filter: &LogFilter,
    ) -> Result<Vec<ProductionLogEntry>, ProductionServiceError> {
        Ok(self.logs.query(filter)?)
    }

    pub fn rules(&self) -> Result<Vec<PointRule>, ProductionServiceError> {
        Ok(self.current_rules()?.as_ref().clone())
    }

    pub fn add_rule(&self, draft: RuleDraft) -> Result<PointRule, ProductionServiceError> {
        validate_rule(&draft)?;
        let current = self.rules.all()?;
        if find_rule(&current, draft.sector, &draft.model, &draft.operation).is_some() {
            return Err(RepositoryError::Conflict.into());
        }

        let stored = self.rules.insert(draft.into_rule(next_rule_id()));
        self.cache.invalidate();
        let stored = stored?;
        info!(rule_id = %stored.id, sector = %stored.sector, "point rule added");
        Ok(stored)
    }

    pub fn update_rule(
        &self,
        id: &RuleId,
        draft: RuleDraft,
    ) -> Result<PointRule, ProductionServiceError> {
        validate_rule(&draft)?;
        let current = self.rules.all()?;
        if !current.iter().any(|rule| &rule.id == id) {
            return Err(RepositoryError::NotFound.into());
        }
        if current.iter().any(|rule| {
            &rule.id != id && rule.matches(draft.sector, &draft.model, &draft.operation)
        }) {
            return Err(RepositoryError::Conflict.into());
        }

        let rule = draft.into_rule(id.clone());
        let result = self.rules.update(rule.clone());
        self.cache.invalidate();
        result?;
        info!(rule_id = %rule.id, points = rule.points_per_unit, "point rule updated");
        Ok(rule)
    }

    pub fn delete_rule(&self, id: &RuleId) -> Result<(), ProductionServiceError> {
        let result = self.rules.delete(id);
        self.cache.invalidate();
        result?;
        info!(rule_id = %id, "point rule deleted");
        Ok(())
    }

    /// Upsert matrix rows from CSV, keyed by `(sector, model, operation)`.
    pub fn import_rules<Rd: Read>(
        &self,
        reader: Rd,
    ) -> Result<RuleImportSummary, ProductionServiceError> {
        let drafts = parse_rules(reader)?;
        for draft in &drafts {
            validate_rule(draft)?;
        }

        let mut current = self.rules.all()?;
        let mut summary = RuleImportSummary::default();
        let outcome = self.apply_import(drafts, &mut current, &mut summary);
        self.cache.invalidate();
        outcome?;

        info!(
            inserted = summary.inserted,
            updated = summary.updated,
            unchanged = summary.unchanged,
            "points matrix imported"
        );
        Ok(summary)
    }

    fn apply_import(
        &self,
        drafts: Vec<RuleDraft>,
        current: &mut Vec<PointRule>,
        summary: &mut RuleImportSummary,
    ) -> Result<(), RepositoryError> {
        for draft in drafts {
            let position = current
                .iter()
                .position(|rule| rule.matches(draft.sector, &draft.model, &draft.operation));

            match position {
                Some(index)
                    if (current[index].points_per_unit - draft.points_per_unit).abs()
                        <= RECALCULATION_EPSILON =>
                {
                    summary.unchanged += 1;
                }
                Some(index) => {
                    let rule = draft.into_rule(current[index].id.clone());
                    self.rules.update(rule.clone())?;
                    current[index] = rule;
                    summary.updated += 1;
                }
                None => {
                    let stored = self.rules.insert(draft.into_rule(next_rule_id()))?;
                    current.push(stored);
                    summary.inserted += 1;
                }
            }
        }
        Ok(())
    }

    pub fn target(&self) -> Result<ProductivityTarget, ProductionServiceError> {
        Ok(self
            .settings
            .productivity_target()?
            .map(ProductivityTarget)
            .unwrap_or(ProductivityTarget(self.config.daily_target)))
    }

    pub fn set_target(&self, points: f64) -> Result<ProductivityTarget, ProductionServiceError> {
        if !(points.is_finite() && points > 0.0) {
            return Err(ProductionServiceError::Validation(
                "productivity target must be a positive number".to_string(),
            ));
        }
        self.settings.set_productivity_target(points)?;
        info!(points, "productivity target updated");
        Ok(ProductivityTarget(points))
    }

    pub fn operator_report(
        &self,
        operator: &str,
        window: LogWindow,
    ) -> Result<OperatorReport, ProductionServiceError> {
        require_text("operator", operator)?;
        if matches!(window, LogWindow::Month { .. }) && window.bounds().is_none() {
            return Err(ProductionServiceError::Validation(
                "month must be between 1 and 12".to_string(),
            ));
        }

        let target = self.target()?.points();
        let logs = self
            .logs
            .query(&LogFilter::for_operator(window, operator))?;
        Ok(OperatorReport::build(operator, window, target, &logs))
    }

    pub fn recent_history(
        &self,
        operator: &str,
        limit: usize,
    ) -> Result<OperatorHistory, ProductionServiceError> {
        require_text("operator", operator)?;
        if limit == 0 || limit > LONG_HISTORY_DAYS {
            return Err(ProductionServiceError::Validation(format!(
                "history limit must be between 1 and {LONG_HISTORY_DAYS} days"
            )));
        }

        let target = self.target()?.points();
        let logs = self
            .logs
            .query(&LogFilter::for_operator(LogWindow::Unrestricted, operator))?;
        Ok(OperatorHistory::build(operator, target, limit, &logs))
    }

    pub fn daily_dashboard(
        &self,
        date: NaiveDate,
    ) -> Result<DailyDashboard, ProductionServiceError> {
        let target = self.target()?.points();
        let logs = self.logs.query(&LogFilter::new(LogWindow::Day { date }))?;
        Ok(DailyDashboard::build(date, target, &logs))
    }

    /// Re-price every stored log and write stale ones back in chunks.
    ///
    /// A failed chunk is skipped; chunks already written stay written.
    pub fn recalculate_all(&self) -> Result<RecalculationSummary, ProductionServiceError> {
        self.cache.invalidate();
        let rules = self.current_rules()?;
        let logs = self.logs.query(&LogFilter::new(LogWindow::Unrestricted))?;
        let updates = pending_updates(&logs, &rules);

        let mut summary = RecalculationSummary {
            examined: logs.len(),
            stale: updates.len(),
            ..RecalculationSummary::default()
        };

        let batch_size = self.config.recalc_batch_size.max(1);
        for (batch, chunk) in updates.chunks(batch_size).enumerate() {
            match self.logs.update_batch(chunk) {
                Ok(applied) => summary.updated += applied,
                Err(error) => {
                    summary.failed_batches += 1;
                    warn!(batch, size = chunk.len(), %error, "recalculation batch failed");
                }
            }
        }

        info!(
            examined = summary.examined,
            stale = summary.stale,
            updated = summary.updated,
            failed_batches = summary.failed_batches,
            "production logs recalculated"
        );
        Ok(summary)
    }

    pub fn catalog(&self) -> Result<Catalog, ProductionServiceError> {
        Ok(self.catalog.catalog()?)
    }

    pub fn register_operator(&self, operator: Operator) -> Result<Operator, ProductionServiceError> {
        require_text("operator name", &operator.name)?;
        self.catalog.insert_operator(operator.clone())?;
        Ok(operator)
    }

    pub fn register_model(&self, model: ProductModel) -> Result<ProductModel, ProductionServiceError> {
        require_text("model name", &model.name)?;
        self.catalog.insert_model(model.clone())?;
        Ok(model)
    }

    pub fn register_operation(
        &self,
        operation: Operation,
    ) -> Result<Operation, ProductionServiceError> {
        require_text("operation name", &operation.name)?;
        self.catalog.insert_operation(operation.clone())?;
        Ok(operation)
    }

    pub fn verify_credential(&self, subject: &str, secret: &str) -> bool {
        self.verifier.verify_credential(subject, secret)
    }

    /// Succeeds only for a verified administrator credential.
    pub fn authorize_admin(
        &self,
        subject: Option<&str>,
        secret: Option<&str>,
    ) -> Result<(), ProductionServiceError> {
        match (subject, secret) {
            (Some(ADMIN_SUBJECT), Some(secret)) if self.verify_credential(ADMIN_SUBJECT, secret) => {
                Ok(())
            }
            _ => Err(ProductionServiceError::Unauthorized),
        }
    }

    /// Administrators may change any log. An operator may change only their
    /// own logs and may not reassign them to someone else.
    pub fn authorize_log_change(
        &self,
        id: &LogId,
        new_operator: Option<&str>,
        subject: Option<&str>,
        secret: Option<&str>,
    ) -> Result<(), ProductionServiceError> {
        let entry = self.logs.fetch(id)?.ok_or(RepositoryError::NotFound)?;
        if self.authorize_admin(subject, secret).is_ok() {
            return Ok(());
        }

        match (subject, secret) {
            (Some(subject), Some(secret))
                if subject == entry.operator
                    && new_operator.map_or(true, |operator| operator == subject)
                    && self.verify_credential(subject, secret) =>
            {
                Ok(())
            }
            _ => {
                warn!(log_id = %id, subject = subject.unwrap_or("-"), "log change rejected");
                Err(ProductionServiceError::Unauthorized)
            }
        }
    }
}

fn entry_from_submission(
    id: LogId,
    submission: WorkSubmission,
    total_points: f64,
) -> ProductionLogEntry {
    ProductionLogEntry {
        id,
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

fn require_text(field: &str, value: &str) -> Result<(), ProductionServiceError> {
    if value.trim().is_empty() {
        Err(ProductionServiceError::Validation(format!(
            "{field} must not be empty"
        )))
    } else {
        Ok(())
    }
}

fn validate_submission(submission: &WorkSubmission) -> Result<(), ProductionServiceError> {
    require_text("operator", &submission.operator)?;
    require_text("model", &submission.model)?;
    require_text("operation", &submission.operation)?;
    if submission.quantity == 0 {
        return Err(ProductionServiceError::Validation(
            "quantity must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_rule(draft: &RuleDraft) -> Result<(), ProductionServiceError> {
    require_text("model", &draft.model)?;
    require_text("operation", &draft.operation)?;
    if !(draft.points_per_unit.is_finite() && draft.points_per_unit >= 0.0) {
        return Err(ProductionServiceError::Validation(
            "points per unit must be a non-negative number".to_string(),
        ));
    }
    Ok(())
}

/// Error raised by the production service.
#[derive(Debug, thiserror::Error)]
pub enum ProductionServiceError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("valid credentials required")]
    Unauthorized,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Import(#[from] ImportError),
}
