use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::domain::PointRule;
use super::repository::{RepositoryError, RuleRepository};

/// Default lifetime of a cached rule set.
pub const DEFAULT_RULE_CACHE_TTL: Duration = Duration::from_secs(300);

/// Rule set cached against the repository revision it was loaded at.
///
/// A cached copy is served only while the repository revision is unchanged
/// and the TTL has not elapsed.
#[derive(Debug)]
pub struct RuleCache {
    ttl: Duration,
    slot: Mutex<Option<CachedRules>>,
}

#[derive(Debug)]
struct CachedRules {
    revision: u64,
    loaded_at: Instant,
    rules: Arc<Vec<PointRule>>,
}

impl RuleCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    pub fn get_or_load<R>(&self, repository: &R) -> Result<Arc<Vec<PointRule>>, RepositoryError>
    where
        R: RuleRepository + ?Sized,
    {
        let revision = repository.revision()?;
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(cached) = slot.as_ref() {
            if cached.revision == revision && cached.loaded_at.elapsed() < self.ttl {
                return Ok(Arc::clone(&cached.rules));
            }
        }

        let rules = Arc::new(repository.all()?);
        *slot = Some(CachedRules {
            revision,
            loaded_at: Instant::now(),
            rules: Arc::clone(&rules),
        });
        Ok(rules)
    }

    pub fn invalidate(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_warm(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Default for RuleCache {
    fn default() -> Self {
        Self::new(DEFAULT_RULE_CACHE_TTL)
    }
}
