//! Exclusive region around non-group resolution.
//!
//! Every duplicate-creating race involves two resolutions of the same tenant,
//! so the default scope keeps one async mutex per tenant. `Global` serializes
//! all tenants behind one mutex.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use ident_store::TenantId;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateScope {
    Global,
    #[default]
    PerTenant,
}

/// Held for the whole critical section; dropping it admits the next resolution.
#[derive(Debug)]
pub struct GatePermit {
    tenant_id: TenantId,
    _guard: OwnedMutexGuard<()>,
}

impl GatePermit {
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

#[derive(Debug, Default)]
pub struct ConcurrencyGate {
    scope: GateScope,
    global: Arc<Mutex<()>>,
    tenants: StdMutex<HashMap<TenantId, Arc<Mutex<()>>>>,
}

impl ConcurrencyGate {
    pub fn new(scope: GateScope) -> Self {
        Self {
            scope,
            ..Self::default()
        }
    }

    pub fn scope(&self) -> GateScope {
        self.scope
    }

    /// Waits until the caller may run a resolution for `tenant_id`.
    pub async fn enter(&self, tenant_id: TenantId) -> GatePermit {
        let lock = match self.scope {
            GateScope::Global => self.global.clone(),
            GateScope::PerTenant => self.tenant_lock(tenant_id),
        };
        GatePermit {
            tenant_id,
            _guard: lock.lock_owned().await,
        }
    }

    /// Number of tenant locks currently held or awaited.
    pub fn tracked_tenants(&self) -> usize {
        let mut table = self.tenants.lock().unwrap_or_else(PoisonError::into_inner);
        prune_idle(&mut table, None);
        table.len()
    }

    fn tenant_lock(&self, tenant_id: TenantId) -> Arc<Mutex<()>> {
        let mut table = self.tenants.lock().unwrap_or_else(PoisonError::into_inner);
        prune_idle(&mut table, Some(tenant_id));
        table.entry(tenant_id).or_default().clone()
    }
}

// A lock whose only reference is the table entry has no holder and no waiter.
fn prune_idle(table: &mut HashMap<TenantId, Arc<Mutex<()>>>, keep: Option<TenantId>) {
    table.retain(|tenant_id, lock| Some(*tenant_id) == keep || Arc::strong_count(lock) > 1);
}
