//! The limiter query surface.

use std::sync::Arc;
use tracing::warn;

use crate::config::OwnedSeriesConfig;
use crate::limits::LimitsProvider;
use crate::ring::{RingSnapshot, RingSource};
use crate::shard::zone_local_shard_size;
use crate::tenant::TenantRegistry;
use crate::types::Zone;

/// Read-only view the write path uses to derive local per-tenant series
/// limits from the global ones.
///
/// Reads never block reconciliation: the shard snapshot is a lock-free-ish
/// read of the tenant scalars, and a one-cycle lag behind the ring is
/// acceptable by design.
pub struct SeriesLimiter {
    registry: Arc<TenantRegistry>,
    ring: Arc<dyn RingSource>,
    limits: Arc<dyn LimitsProvider>,
    use_owned_for_limits: bool,
    zone_awareness_enabled: bool,
    zone: Zone,
}

impl SeriesLimiter {
    /// Create a limiter sharing the service's collaborators.
    pub fn new(
        config: &OwnedSeriesConfig,
        registry: Arc<TenantRegistry>,
        ring: Arc<dyn RingSource>,
        limits: Arc<dyn LimitsProvider>,
    ) -> Self {
        Self {
            registry,
            ring,
            limits,
            use_owned_for_limits: config.use_owned_for_limits,
            zone_awareness_enabled: config.zone_awareness_enabled,
            zone: config.zone.clone(),
        }
    }

    /// The local series limit for a tenant: the global limit divided over
    /// the ingesters sharing the tenant's series.
    ///
    /// With owned-series limits enabled, the denominator is the shard-member
    /// count captured at the last reconciliation, clamped to the instances
    /// actually present in this zone right now: a scale-down takes effect
    /// immediately (an over-estimated denominator would defeat the limit),
    /// while a scale-up waits for reconciliation to confirm it. A tenant not
    /// yet reconciled gets the denominator the first pass would capture,
    /// derived from its configured shard size against the current ring.
    /// Deployments with owned-series limits disabled use the plain ring
    /// count.
    ///
    /// Returns `0` when the tenant has no global limit.
    pub fn local_series_limit(&self, tenant: &str) -> u64 {
        let global = self.limits.global_series_limit(tenant);
        if global == 0 {
            return 0;
        }

        let snapshot = match self.ring.current_snapshot() {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                // Fail open: a denominator of 1 grants the full global limit
                // rather than rejecting writes on a ring hiccup.
                warn!(%err, "failed to read ring for local limit, using full global limit");
                None
            }
        };
        let live = snapshot
            .as_ref()
            .map(|snapshot| self.zone_instances(snapshot))
            .unwrap_or(1);

        let shards = if self.use_owned_for_limits {
            let captured = self
                .registry
                .get(tenant)
                .map(|db| db.load_owned().limit_shards)
                .unwrap_or(0);
            if captured > 0 {
                captured as usize
            } else {
                self.starting_shards(tenant, snapshot.as_deref(), live)
            }
        } else {
            live
        };

        global / shards.min(live.max(1)).max(1) as u64
    }

    /// Denominator for a tenant that has never been reconciled: what the
    /// first pass would capture, derived from the configured shard size and
    /// the current ring. A tenant with no explicit shard spreads over the
    /// whole zone (or ring).
    fn starting_shards(
        &self,
        tenant: &str,
        snapshot: Option<&RingSnapshot>,
        live: usize,
    ) -> usize {
        let configured = self.limits.tenant_shard_size(tenant).max(0) as u32;
        match snapshot {
            Some(snapshot) if configured > 0 => zone_local_shard_size(
                configured,
                snapshot,
                self.zone_awareness_enabled,
                &self.zone,
            ) as usize,
            _ => live,
        }
    }

    /// Instances sharing this tenant's series from the write path's point of
    /// view: the local zone with zone awareness, the whole ring without.
    fn zone_instances(&self, snapshot: &RingSnapshot) -> usize {
        if self.zone_awareness_enabled {
            snapshot.instances_in_zone(&self.zone)
        } else {
            snapshot.instance_count()
        }
    }
}

impl std::fmt::Debug for SeriesLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeriesLimiter")
            .field("use_owned_for_limits", &self.use_owned_for_limits)
            .field("zone_awareness_enabled", &self.zone_awareness_enabled)
            .field("zone", &self.zone)
            .finish()
    }
}
