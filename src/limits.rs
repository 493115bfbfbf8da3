//! Per-tenant limit configuration.

use dashmap::DashMap;
use tracing::warn;

use crate::types::TenantId;

/// Read access to per-tenant limit configuration.
///
/// The configuration loader of the host process implements this; tests and
/// embedders can use `InMemoryLimits`.
pub trait LimitsProvider: Send + Sync {
    /// The tenant's configured shuffle-shard size. `0` means the tenant
    /// spreads over the whole ring. Negative values are configuration
    /// mistakes and are sanitized to `0` by the service.
    fn tenant_shard_size(&self, tenant: &str) -> i32;

    /// The tenant's global series limit across the fleet. `0` disables the
    /// limit.
    fn global_series_limit(&self, tenant: &str) -> u64;
}

/// Limits for one tenant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TenantLimits {
    pub shard_size: i32,
    pub global_series_limit: u64,
}

/// Mutable in-memory limits, keyed by tenant with a fallback default.
#[derive(Debug, Default)]
pub struct InMemoryLimits {
    defaults: TenantLimits,
    overrides: DashMap<TenantId, TenantLimits>,
}

impl InMemoryLimits {
    /// Create with all-zero defaults (no sharding, no limit).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with the given defaults.
    pub fn with_defaults(defaults: TenantLimits) -> Self {
        Self {
            defaults,
            overrides: DashMap::new(),
        }
    }

    /// Replace one tenant's limits.
    pub fn set(&self, tenant: &str, limits: TenantLimits) {
        self.overrides.insert(tenant.to_string(), limits);
    }

    /// Change one tenant's shard size.
    pub fn set_shard_size(&self, tenant: &str, shard_size: i32) {
        self.overrides
            .entry(tenant.to_string())
            .or_insert(self.defaults)
            .shard_size = shard_size;
    }

    /// Change one tenant's global series limit.
    pub fn set_global_series_limit(&self, tenant: &str, limit: u64) {
        self.overrides
            .entry(tenant.to_string())
            .or_insert(self.defaults)
            .global_series_limit = limit;
    }

    fn lookup(&self, tenant: &str) -> TenantLimits {
        self.overrides
            .get(tenant)
            .map(|entry| *entry)
            .unwrap_or(self.defaults)
    }
}

impl LimitsProvider for InMemoryLimits {
    fn tenant_shard_size(&self, tenant: &str) -> i32 {
        self.lookup(tenant).shard_size
    }

    fn global_series_limit(&self, tenant: &str) -> u64 {
        self.lookup(tenant).global_series_limit
    }
}

/// Sanitizes configured shard sizes, logging each bad value once per tenant.
#[derive(Debug, Default)]
pub struct ShardSizeSanitizer {
    last_warned: DashMap<TenantId, i32>,
}

impl ShardSizeSanitizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat a negative configured shard size as `0` (spread over the whole
    /// ring). The warning fires once per tenant per distinct bad value, not
    /// on every reconciliation pass.
    pub fn sanitize(&self, tenant: &str, configured: i32) -> u32 {
        if configured >= 0 {
            self.last_warned.remove(tenant);
            return configured as u32;
        }

        let already_warned = self
            .last_warned
            .insert(tenant.to_string(), configured)
            .map(|previous| previous == configured)
            .unwrap_or(false);
        if !already_warned {
            warn!(tenant, shard_size = configured, "negative tenant shard size, treating as 0");
        }
        0
    }
}
