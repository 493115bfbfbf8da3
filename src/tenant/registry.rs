//! Tenant registry.

use dashmap::DashMap;
use std::sync::Arc;

use crate::tenant::db::TenantDb;
use crate::types::TenantId;

/// All tenants with an open series database on this ingester.
///
/// Enumeration returns a point-in-time id snapshot so the reconciliation
/// driver never iterates the map while ingestion inserts into it; per-tenant
/// locks are acquired only after the snapshot is taken.
#[derive(Debug, Default)]
pub struct TenantRegistry {
    tenants: DashMap<TenantId, Arc<TenantDb>>,
}

impl TenantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the tenant's database, creating it on first write.
    pub fn get_or_create(&self, tenant: &str) -> Arc<TenantDb> {
        self.tenants
            .entry(tenant.to_string())
            .or_insert_with(|| Arc::new(TenantDb::new(tenant)))
            .clone()
    }

    /// Get the tenant's database if it exists.
    pub fn get(&self, tenant: &str) -> Option<Arc<TenantDb>> {
        self.tenants.get(tenant).map(|entry| entry.clone())
    }

    /// A snapshot of the current tenant ids.
    pub fn list(&self) -> Vec<TenantId> {
        self.tenants.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Drop the tenant's database when its TSDB is closed. Returns whether
    /// it existed.
    pub fn close(&self, tenant: &str) -> bool {
        self.tenants.remove(tenant).is_some()
    }

    /// Number of open tenants.
    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    /// Whether no tenants are open.
    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }
}
