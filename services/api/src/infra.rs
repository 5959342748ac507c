use metrics_exporter_prometheus::PrometheusHandle;
use shopfloor::production::{
    Catalog, CatalogRepository, LogFilter, LogId, LogRepository, Operation, Operator, PointRule,
    ProductModel, ProductionLogEntry, RepositoryError, RuleId, RuleRepository, SettingsStore,
};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("in-memory store poisoned".to_string()))
}

#[derive(Default)]
struct RuleTable {
    rules: Vec<PointRule>,
    revision: u64,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryRuleRepository {
    table: Arc<Mutex<RuleTable>>,
}

impl RuleRepository for InMemoryRuleRepository {
    fn all(&self) -> Result<Vec<PointRule>, RepositoryError> {
        Ok(lock(&self.table)?.rules.clone())
    }

    fn insert(&self, rule: PointRule) -> Result<PointRule, RepositoryError> {
        let mut table = lock(&self.table)?;
        if table.rules.iter().any(|existing| existing.id == rule.id) {
            return Err(RepositoryError::Conflict);
        }
        table.rules.push(rule.clone());
        table.revision += 1;
        Ok(rule)
    }

    fn update(&self, rule: PointRule) -> Result<(), RepositoryError> {
        let mut table = lock(&self.table)?;
        let slot = table
            .rules
            .iter_mut()
            .find(|existing| existing.id == rule.id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = rule;
        table.revision += 1;
        Ok(())
    }

    fn delete(&self, id: &RuleId) -> Result<(), RepositoryError> {
        let mut table = lock(&self.table)?;
        let before = table.rules.len();
        table.rules.retain(|rule| &rule.id != id);
        if table.rules.len() == before {
            return Err(RepositoryError::NotFound);
        }
        table.revision += 1;
        Ok(())
    }

    fn revision(&self) -> Result<u64, RepositoryError> {
        Ok(lock(&self.table)?.revision)
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryLogRepository {
    entries: Arc<Mutex<HashMap<LogId, ProductionLogEntry>>>,
}

impl LogRepository for InMemoryLogRepository {
    fn insert(&self, entry: ProductionLogEntry) -> Result<ProductionLogEntry, RepositoryError> {
        let mut guard = lock(&self.entries)?;
        if guard.contains_key(&entry.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(entry.id.clone(), entry.clone());
        Ok(entry)
    }

    fn update(&self, entry: ProductionLogEntry) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.entries)?;
        match guard.get_mut(&entry.id) {
            Some(slot) => {
                *slot = entry;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn update_batch(&self, entries: &[ProductionLogEntry]) -> Result<usize, RepositoryError> {
        let mut guard = lock(&self.entries)?;
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
        lock(&self.entries)?
            .remove(id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    fn fetch(&self, id: &LogId) -> Result<Option<ProductionLogEntry>, RepositoryError> {
        Ok(lock(&self.entries)?.get(id).cloned())
    }

    fn query(&self, filter: &LogFilter) -> Result<Vec<ProductionLogEntry>, RepositoryError> {
        let mut entries: Vec<ProductionLogEntry> = lock(&self.entries)?
            .values()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(entries)
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemorySettings {
    target: Arc<Mutex<Option<f64>>>,
}

impl SettingsStore for InMemorySettings {
    fn productivity_target(&self) -> Result<Option<f64>, RepositoryError> {
        Ok(*lock(&self.target)?)
    }

    fn set_productivity_target(&self, points: f64) -> Result<(), RepositoryError> {
        *lock(&self.target)? = Some(points);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryCatalog {
    catalog: Arc<Mutex<Catalog>>,
}

impl CatalogRepository for InMemoryCatalog {
    fn catalog(&self) -> Result<Catalog, RepositoryError> {
        Ok(lock(&self.catalog)?.clone())
    }

    fn insert_operator(&self, operator: Operator) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.catalog)?;
        if guard.operators.iter().any(|known| known.name == operator.name) {
            return Err(RepositoryError::Conflict);
        }
        guard.operators.push(operator);
        Ok(())
    }

    fn insert_model(&self, model: ProductModel) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.catalog)?;
        if guard.models.iter().any(|known| known.name == model.name) {
            return Err(RepositoryError::Conflict);
        }
        guard.models.push(model);
        Ok(())
    }

    fn insert_operation(&self, operation: Operation) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.catalog)?;
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
