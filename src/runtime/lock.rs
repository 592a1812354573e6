use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

use crate::models::{AnalysisModule, TenantId};

type RunKey = (TenantId, AnalysisModule);

/// Registry of in-flight runs, at most one per (tenant, module)
#[derive(Debug, Clone, Default)]
pub struct RunLocks {
    active: Arc<Mutex<HashSet<RunKey>>>,
}

impl RunLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the (tenant, module) slot; `None` if a run already holds it
    pub fn try_acquire(&self, tenant: &TenantId, module: AnalysisModule) -> Option<RunGuard> {
        let key = (tenant.clone(), module);
        let mut active = self.active.lock();
        if !active.insert(key.clone()) {
            return None;
        }
        Some(RunGuard {
            active: Arc::clone(&self.active),
            key,
        })
    }

    #[cfg(test)]
    pub fn is_running(&self, tenant: &TenantId, module: AnalysisModule) -> bool {
        self.active.lock().contains(&(tenant.clone(), module))
    }
}

/// Releases the slot when dropped, whether the run succeeded or failed
#[derive(Debug)]
pub struct RunGuard {
    active: Arc<Mutex<HashSet<RunKey>>>,
    key: RunKey,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.active.lock().remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_refused_until_drop() {
        let locks = RunLocks::new();
        let acme = TenantId::new("acme").unwrap();

        let guard = locks.try_acquire(&acme, AnalysisModule::Observatory);
        assert!(guard.is_some());
        assert!(locks.is_running(&acme, AnalysisModule::Observatory));
        assert!(locks.try_acquire(&acme, AnalysisModule::Observatory).is_none());

        drop(guard);
        assert!(!locks.is_running(&acme, AnalysisModule::Observatory));
        assert!(locks.try_acquire(&acme, AnalysisModule::Observatory).is_some());
    }

    #[test]
    fn test_slots_are_per_tenant_and_module() {
        let locks = RunLocks::new();
        let acme = TenantId::new("acme").unwrap();
        let globex = TenantId::new("globex").unwrap();

        let _a = locks.try_acquire(&acme, AnalysisModule::Observatory).unwrap();
        assert!(locks.try_acquire(&acme, AnalysisModule::Commercial).is_some());
        assert!(locks.try_acquire(&globex, AnalysisModule::Observatory).is_some());
    }
}
