//! The owned-series recomputer.

use crate::config::OwnedSeriesConfig;
use crate::ring::{owner_in_index, RingSnapshot};
use crate::shard::{shuffle_shard, zone_local_shard_size};
use crate::tenant::TenantDb;

/// Outcome of one recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnedComputation {
    /// Head series this ingester is authoritative for.
    pub owned_count: usize,
    /// Zone-local effective shard size; `0` when the tenant has no explicit
    /// shard.
    pub shard_size: u32,
    /// Denominator for the local series limit.
    pub limit_shards: u32,
}

/// Recompute a tenant's owned series against the given ring snapshot.
///
/// The head is read through a point-in-time snapshot and the tenant scalar
/// lock is never held here, so ingestion and compaction proceed freely while
/// this runs. Series removed mid-computation merely leave the count one pass
/// behind.
pub fn compute_owned_series(
    snapshot: &RingSnapshot,
    db: &TenantDb,
    configured_shard_size: u32,
    config: &OwnedSeriesConfig,
) -> OwnedComputation {
    let zone_aware = config.zone_awareness_enabled;
    let shard_size =
        zone_local_shard_size(configured_shard_size, snapshot, zone_aware, &config.zone);
    let limit_shards = if configured_shard_size == 0 {
        if zone_aware {
            snapshot.instances_in_zone(&config.zone) as u32
        } else {
            snapshot.instance_count() as u32
        }
    } else {
        shard_size
    };

    let not_owning = OwnedComputation {
        owned_count: 0,
        shard_size,
        limit_shards,
    };

    if snapshot.is_empty() {
        return not_owning;
    }

    let subset = shuffle_shard(snapshot, db.tenant_id(), configured_shard_size, zone_aware);
    if !subset.contains(config.instance_id.as_str()) {
        return not_owning;
    }

    let index = snapshot.token_index_for(&subset);
    if index.is_empty() {
        return not_owning;
    }

    let owned_count = db
        .head_series_snapshot()
        .into_iter()
        .filter(|&token| {
            owner_in_index(&index, token).is_some_and(|owner| *owner == config.instance_id)
        })
        .count();

    OwnedComputation {
        owned_count,
        shard_size,
        limit_shards,
    }
}
