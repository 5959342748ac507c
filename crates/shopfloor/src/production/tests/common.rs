use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};

use crate::config::ProductionConfig;
use crate::production::auth::DigestCredentialStore;
use crate::production::domain::{
    Catalog, LogId, Operation, Operator, PointRule, ProductModel, ProductionLogEntry, RuleDraft,
    RuleId, Sector, WorkSubmission,
};
use crate::production::repository::{
    CatalogRepository, LogFilter, LogRepository, RepositoryError, RuleRepository, SettingsStore,
};
use crate::production::service::ProductionService;

pub(super) const ADMIN_SECRET: &str = "correct horse";

#[derive(Default)]
pub(super) struct MemoryRules {
    rules: Mutex<Vec<PointRule>>,
    revision: AtomicU64,
    pub(super) loads: AtomicUsize,
}

impl RuleRepository for MemoryRules {
    fn all(&self) -> Result<Vec<PointRule>, RepositoryError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.rules.lock().expect("rules mutex poisoned").clone())
    }

    fn insert(&self, rule: PointRule) -> Result<PointRule, RepositoryError> {
        let mut guard = self.rules.lock().expect("rules mutex poisoned");
        if guard.iter().any(|existing| existing.id == rule.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.push(rule.clone());
        self.revision.fetch_add(1, Ordering::SeqCst);
        Ok(rule)
    }

    fn update(&self, rule: PointRule) -> Result<(), RepositoryError> {
        let mut guard = self.rules.lock().expect("rules mutex poisoned");
        let slot = guard
            .iter_mut()
            .find(|existing| existing.id == rule.id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = rule;
        self.revision.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn delete(&self, id: &RuleId) -> Result<(), RepositoryError> {
        let mut guard = self.rules.lock().expect("rules mutex poisoned");
        let before = guard.len();
        guard.retain(|rule| &rule.id != id);
        if guard.len() == before {
            return Err(RepositoryError::NotFound);
        }
        self.revision.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn revision(&self) -> Result<u64, RepositoryError> {
        Ok(self.revision.load(Ordering::SeqCst))
    }
}

impl MemoryRules {
    /// Writes behind the service's back, as another process would.
    pub(super) fn replace_points(&self, id: &RuleId, points: f64) {
        let mut guard = self.rules.lock().expect("rules mutex poisoned");
        if let Some(rule) = guard.iter_mut().find(|rule| &rule.id == id) {
            rule.points_per_unit = points;
        }
        self.revision.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub(super) struct MemoryLogs {
    entries: Mutex<HashMap<LogId, ProductionLogEntry>>,
    /// Zero-based index of an `update_batch` call that should fail.
    pub(super) failing_batch: Option<usize>,
    batch_calls: AtomicUsize,
}

impl MemoryLogs {
    pub(super) fn failing_on_batch(index: usize) -> Self {
        Self {
            failing_batch: Some(index),
            ..Self::default()
        }
    }

    pub(super) fn seed(&self, entry: ProductionLogEntry) {
        self.entries
            .lock()
            .expect("log mutex poisoned")
            .insert(entry.id.clone(), entry);
    }

    pub(super) fn get(&self, id: &LogId) -> Option<ProductionLogEntry> {
        self.entries
            .lock()
            .expect("log mutex poisoned")
            .get(id)
            .cloned()
    }

    pub(super) fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }
}

impl LogRepository for MemoryLogs {
    fn insert(&self, entry: ProductionLogEntry) -> Result<ProductionLogEntry, RepositoryError> {
        let mut guard = self.entries.lock().expect("log mutex poisoned");
        if guard.contains_key(&entry.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(entry.id.clone(), entry.clone());
        Ok(entry)
    }

    fn update(&self, entry: ProductionLogEntry) -> Result<(), RepositoryError> {
        let mut guard = self.entries.lock().expect("log mutex poisoned");
        if guard.contains_key(&entry.id) {
            guard.insert(entry.id.clone(), entry);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn update_batch(&self, entries: &[ProductionLogEntry]) -> Result<usize, RepositoryError> {
        let call = self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_batch == Some(call) {
            return Err(RepositoryError::Unavailable("write batch rejected".to_string()));
        }

        let mut guard = self.entries.lock().expect("log mutex poisoned");
        let mut applied = 0;
        for entry in entries {
            if let Some(slot) = guard.get_mut(&entry.id) {
                *slot = entry.clone();
                applied += 1;
            }
        }
        Ok(applied)
    }

    fn delete(&self, id: &LogId) -> Result<(), RepositoryError> {
        let mut guard = self.entries.lock().expect("log mutex poisoned");
        guard.remove(id).map(|_| ()).ok_or(RepositoryError::NotFound)
    }

    fn fetch(&self, id: &LogId) -> Result<Option<ProductionLogEntry>, RepositoryError> {
        Ok(self.get(id))
    }

    fn query(&self, filter: &LogFilter) -> Result<Vec<ProductionLogEntry>, RepositoryError> {
        let guard = self.entries.lock().expect("log mutex poisoned");
        let mut entries: Vec<ProductionLogEntry> = guard
            .values()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }
}

#[derive(Default)]
pub(super) struct MemorySettings {
    target: Mutex<Option<f64>>,
}

impl SettingsStore for MemorySettings {
    fn productivity_target(&self) -> Result<Option<f64>, RepositoryError> {
        Ok(*self.target.lock().expect("settings mutex poisoned"))
    }

    fn set_productivity_target(&self, points: f64) -> Result<(), RepositoryError> {
        *self.target.lock().expect("settings mutex poisoned") = Some(points);
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct MemoryCatalog {
    catalog: Mutex<Catalog>,
}

impl CatalogRepository for MemoryCatalog {
    fn catalog(&self) -> Result<Catalog, RepositoryError> {
        Ok(self.catalog.lock().expect("catalog mutex poisoned").clone())
    }

    fn insert_operator(&self, operator: Operator) -> Result<(), RepositoryError> {
        let mut guard = self.catalog.lock().expect("catalog mutex poisoned");
        if guard.operators.iter().any(|known| known.name == operator.name) {
            return Err(RepositoryError::Conflict);
        }
        guard.operators.push(operator);
        Ok(())
    }

    fn insert_model(&self, model: ProductModel) -> Result<(), RepositoryError> {
        let mut guard = self.catalog.lock().expect("catalog mutex poisoned");
        if guard.models.iter().any(|known| known.name == model.name) {
            return Err(RepositoryError::Conflict);
        }
        guard.models.push(model);
        Ok(())
    }

    fn insert_operation(&self, operation: Operation) -> Result<(), RepositoryError> {
        let mut guard = self.catalog.lock().expect("catalog mutex poisoned");
        if guard
            .operations
            .iter()
            .any(|known| known.name == operation.name && known.sector == operation.sector)
        {
            return Err(RepositoryError::Conflict);
        }
        guard.operations.push(operation);
        Ok(())
    }
}

pub(super) type TestService = ProductionService<MemoryRules, MemoryLogs, MemorySettings, MemoryCatalog>;

pub(super) struct Harness {
    pub(super) service: Arc<TestService>,
    pub(super) rules: Arc<MemoryRules>,
    pub(super) logs: Arc<MemoryLogs>,
}

pub(super) fn production_config() -> ProductionConfig {
    ProductionConfig {
        daily_target: 500.0,
        rule_cache_ttl: Duration::from_secs(60),
        recalc_batch_size: 2,
    }
}

pub(super) fn harness() -> Harness {
    harness_with_logs(MemoryLogs::default())
}

pub(super) fn harness_with_logs(logs: MemoryLogs) -> Harness {
    let rules = Arc::new(MemoryRules::default());
    let logs = Arc::new(logs);
    let verifier = DigestCredentialStore::new()
        .with_secret(crate::production::ADMIN_SUBJECT, ADMIN_SECRET)
        .with_secret("Ana", "4821");
    let service = Arc::new(ProductionService::new(
        rules.clone(),
        logs.clone(),
        Arc::new(MemorySettings::default()),
        Arc::new(MemoryCatalog::default()),
        Arc::new(verifier),
        production_config(),
    ));

    Harness {
        service,
        rules,
        logs,
    }
}

pub(super) fn laser_cut_rule() -> RuleDraft {
    RuleDraft {
        sector: Sector::Corte,
        model: "Model-X".to_string(),
        operation: "Laser Cut".to_string(),
        points_per_unit: 5.0,
    }
}

pub(super) fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, day)
        .and_then(|date| date.and_hms_opt(hour, 0, 0))
        .expect("valid timestamp")
}

pub(super) fn work(operator: &str, day: u32, model: &str, quantity: u32) -> WorkSubmission {
    WorkSubmission {
        timestamp: at(day, 9),
        operator: operator.to_string(),
        sector: Sector::Corte,
        model: model.to_string(),
        operation: "Laser Cut".to_string(),
        quantity,
        order_ref: Some("OP-2024-01".to_string()),
        comment: None,
    }
}

pub(super) fn stored_entry(id: &str, model: &str, quantity: u32, points: f64) -> ProductionLogEntry {
    ProductionLogEntry {
        id: LogId(id.to_string()),
        timestamp: at(10, 7),
        operator: "A".to_string(),
        sector: Sector::Corte,
        model: model.to_string(),
        operation: "Laser Cut".to_string(),
        quantity,
        total_points: points,
        order_ref: None,
        comment: None,
    }
}
