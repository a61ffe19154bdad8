//! Cached communication plans of cross-partition kernels.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{ErrorKind, Result};

/// Per-destination element counts of one all-to-all exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommPlan {
    pub send_counts: Vec<usize>,
}

impl CommPlan {
    pub fn total(&self) -> usize {
        self.send_counts.iter().sum()
    }
}

/// Plans keyed by kernel signature, owned by the caller next to one distributed block.
///
/// Lookups take a shared lock; a missing plan is built outside any lock and
/// inserted under the exclusive lock, where the first inserted plan wins.
#[derive(Debug, Default)]
pub struct PlanCache {
    plans: RwLock<HashMap<[u64; 8], Arc<CommPlan>>>,
}

impl PlanCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The plan for `key`, built with `build` the first time it is requested.
    pub fn get_or_build<F>(&self, key: [u64; 8], build: F) -> Result<Arc<CommPlan>>
    where
        F: FnOnce() -> Result<CommPlan>,
    {
        {
            let plans = self.plans.read().map_err(|_| poisoned())?;
            if let Some(plan) = plans.get(&key) {
                return Ok(Arc::clone(plan));
            }
        }
        let plan = Arc::new(build()?);
        let mut plans = self.plans.write().map_err(|_| poisoned())?;
        let entry = plans.entry(key).or_insert_with(|| {
            log::debug!("cached communication plan sending {} elements", plan.total());
            Arc::clone(&plan)
        });
        Ok(Arc::clone(entry))
    }

    pub fn len(&self) -> usize {
        self.plans.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut plans) = self.plans.write() {
            plans.clear();
        }
    }
}

fn poisoned() -> crate::error::EdError {
    ErrorKind::Communication("plan cache lock poisoned".to_string()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plans_are_built_once() {
        let cache = PlanCache::new();
        let key = [1, 2, 3, 4, 5, 6, 7, 8];
        let mut builds = 0;
        for _ in 0..3 {
            let plan = cache
                .get_or_build(key, || {
                    builds += 1;
                    Ok(CommPlan {
                        send_counts: vec![2, 0, 1],
                    })
                })
                .unwrap();
            assert_eq!(plan.total(), 3);
        }
        assert_eq!(builds, 1);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_failed_builds_are_not_cached() {
        let cache = PlanCache::new();
        let err = cache
            .get_or_build([0; 8], || {
                Err(ErrorKind::Communication("rank 1 unreachable".to_string()).into())
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "Communication failure: rank 1 unreachable");
        assert!(cache.is_empty());
    }
}
