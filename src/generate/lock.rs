//! Per-scope exclusivity for generation runs.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::error::GridError;
use crate::store::GridScope;

/// Set of scopes with a run in flight.
#[derive(Debug, Clone, Default)]
pub struct GenerationLocks {
    active: Arc<Mutex<HashSet<GridScope>>>,
}

impl GenerationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `scope` for one run.
    ///
    /// # Errors
    ///
    /// [`GridError::GenerationInProgress`] when another run holds the scope.
    pub fn try_acquire(&self, scope: GridScope) -> Result<ScopeGuard, GridError> {
        let mut active = self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !active.insert(scope) {
            return Err(GridError::GenerationInProgress {
                target: scope.to_string(),
            });
        }
        Ok(ScopeGuard {
            scope,
            active: Arc::clone(&self.active),
        })
    }

    /// Whether a run currently holds `scope`.
    pub fn is_held(&self, scope: &GridScope) -> bool {
        self.active
            .lock()
            .map(|active| active.contains(scope))
            .unwrap_or(false)
    }
}

/// Releases its scope when dropped.
#[derive(Debug)]
pub struct ScopeGuard {
    scope: GridScope,
    active: Arc<Mutex<HashSet<GridScope>>>,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        let mut active = self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        active.remove(&self.scope);
    }
}
